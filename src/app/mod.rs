pub mod runner;

pub use runner::EtlApp;
