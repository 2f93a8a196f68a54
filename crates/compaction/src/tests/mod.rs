mod helpers;

mod range_tests;
mod snapshot_tests;
