/*! Integration tests for aclread.
 *
 * This test suite is organized as a single integration test binary
 * following the pattern described by matklad in
 * https://matklad.github.io/2021/02/27/delete-cargo-integration-tests.html
 *
 * The module structure mirrors the main library structure:
 * - aclread: Tests for the read filter, organized by concern
 * - backend: Tests for the in-memory directory backend
 * - config: Tests for loading the module configuration
 * - schema: Tests for the in-memory schema catalog
 */

use tracing_subscriber::EnvFilter;

#[ctor::ctor]
fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("aclread=info".parse().unwrap()),
        )
        .with_test_writer()
        .try_init();
}

mod aclread;
mod config;
