//! Site-code allocation.
//!
//! Site codes have the form `<parentCode>/<sequence>`. The next sequence is
//! derived from a live scan of the parent's current sites, reusing the lowest
//! freed number so codes stay dense after deletions. This is a best-effort
//! allocator, not a transactional one: [`crate::registry::Registry`] re-runs
//! the scan immediately before the write and surfaces a concurrent take as
//! [`crate::Error::SequenceTaken`] for the caller to confirm.

use serde::{Deserialize, Serialize};

use crate::{
  Result,
  entity::Entity,
  error::Error,
  store::{EntityFilter, EntityStore},
};

/// A minted site code together with its numeric sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
  pub code:     String,
  pub sequence: u32,
}

impl Allocation {
  pub fn new(parent_code: &str, sequence: u32) -> Self {
    Self { code: format!("{parent_code}/{sequence}"), sequence }
  }
}

/// The first unused sequence number among `sites`.
///
/// Unparseable suffixes are ignored. The sorted parsed numbers are walked
/// for the first gap; with no gap the next number is `count + 1`.
pub fn next_sequence(sites: &[Entity]) -> u32 {
  let mut taken: Vec<u32> = sites.iter().filter_map(Entity::sequence).collect();
  taken.sort_unstable();

  for (i, seq) in taken.iter().enumerate() {
    let expected = i as u32 + 1;
    if *seq != expected {
      return expected;
    }
  }
  taken.len() as u32 + 1
}

/// Scan `parent`'s live sites and mint the next allocation.
pub async fn allocate<S: EntityStore>(
  store: &S,
  parent: &Entity,
) -> Result<Allocation> {
  let sites = store
    .list_entities(&EntityFilter::sites_of(parent.id))
    .await
    .map_err(Error::store)?;
  Ok(Allocation::new(&parent.code, next_sequence(&sites)))
}
