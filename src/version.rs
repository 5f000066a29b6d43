//! Build identification.

const UNKNOWN: &str = "unknown";

/// Git revision stamped by the build environment.
pub const GIT_REVISION: Option<&str> = option_env!("PORTGATE_GIT_REVISION");
/// Compiler version stamped by the build environment.
pub const RUSTC_VERSION: Option<&str> = option_env!("PORTGATE_RUSTC_VERSION");
/// Build date stamped by the build environment.
pub const BUILD_DATE: Option<&str> = option_env!("PORTGATE_BUILD_DATE");

/// `portgate: <version> <git revision> <rustc> <build date>`
pub fn version_info() -> String {
    format!(
        "portgate: {} {} {} {}",
        env!("CARGO_PKG_VERSION"),
        GIT_REVISION.unwrap_or(UNKNOWN),
        RUSTC_VERSION.unwrap_or(UNKNOWN),
        BUILD_DATE.unwrap_or(UNKNOWN),
    )
}
