pub mod assist;
pub mod check;
pub mod claim_ops;
pub mod export;
pub mod index;
pub mod registry_ops;
pub mod search;
pub mod tree_ops;
