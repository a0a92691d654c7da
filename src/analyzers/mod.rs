//! Stages that work on whole directories of stop records: the merge of
//! upstream band results, the dead-station export and the final collection.

pub mod aggregate;
pub mod dead;
