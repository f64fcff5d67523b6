pub use preset::Preset;

#[allow(clippy::module_inception)]
mod preset;
