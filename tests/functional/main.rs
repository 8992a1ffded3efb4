#[cfg(feature = "functional-tests")]
mod cluster;

#[cfg(feature = "functional-tests")]
mod resources;

#[cfg(feature = "functional-tests")]
mod status;

#[cfg(feature = "functional-tests")]
pub use cluster::TestCluster;

#[cfg(feature = "functional-tests")]
pub use resources::TestResources;
