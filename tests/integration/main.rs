mod common;
mod lifecycle_tests;
mod tools_tests;
