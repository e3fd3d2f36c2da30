//! Library integration tests: manifests on disk through loading, planning
//! and a dry-run deployment.

mod common;
mod deploy_tests;
mod load_tests;
