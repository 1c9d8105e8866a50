//! Integration tests for cgroup_runtime
//!
//! Each test builds its own cgroup tree in a temp dir and, where needed,
//! serves ECS task metadata from a local HTTP endpoint. No container
//! runtime or network access is required.
//!
//! Run with: cargo test --test integration

mod helpers;

mod tuning;
