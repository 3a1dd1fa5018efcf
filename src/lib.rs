#![deny(unused_must_use)]
#![forbid(unsafe_code)]

pub use format_version::{FormatVersion, IdWidth};
pub use population::{DEFAULT_POPULATION_TYPE, DecodedResult, PopulationNode, Rgb};
pub use pr_parser::{ParserSettings, PrParser, decode, synthesize_populations};
pub use utils::RecordReader;

pub mod container;
pub mod err;
pub mod format_version;
pub mod population;
pub mod population_xml;
pub mod pr_parser;
pub mod utils;
pub mod xml_tree;

#[cfg(test)]
use std::sync::Once;

#[cfg(test)]
static LOGGER_INIT: Once = Once::new();

// Rust runs the tests concurrently, so unless we synchronize logging access
// it will crash when attempting to run `cargo test` with some logging facilities.
#[cfg(test)]
pub fn ensure_env_logger_initialized() {
    use std::io::Write;

    LOGGER_INIT.call_once(|| {
        let mut builder = env_logger::Builder::from_default_env();
        builder
            .format(|buf, record| writeln!(buf, "[{}] - {}", record.level(), record.args()))
            .is_test(true)
            .init();
    });
}
