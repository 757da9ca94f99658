//! Scaleway REST API Client
//!
//! A typed client for the subset of the Scaleway API used by the cluster
//! infrastructure controllers: VPC (private networks), Public Gateways,
//! Load Balancers, Instances, Security Groups, Marketplace and IPAM.
//!
//! List endpoints of the provider match names and tags by prefix/substring,
//! never exactly. The `find_*` helpers on [`ScalewayClientTrait`] layer exact
//! matching on top: they return [`ScalewayError::NoItemFound`] when nothing
//! matches exactly and [`ScalewayError::TooManyItemsFound`] when a lookup that
//! must be unique is ambiguous.
//!
//! # Example
//!
//! ```no_run
//! use scaleway_client::{ScalewayClient, ScalewayClientTrait, Zone};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = ScalewayClient::new(
//!     "access-key".to_string(),
//!     "secret-key".to_string(),
//!     "project-id".to_string(),
//!     None,
//! )?;
//!
//! let zone = Zone::from("fr-par-1");
//! let server = client.find_server_by_name(&zone, "caps-my-machine").await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod models;
#[path = "trait.rs"]
pub mod scaleway_trait;
pub mod types;
#[cfg(feature = "test-util")]
pub mod mock;

pub use client::ScalewayClient;
pub use error::ScalewayError;
pub use models::*;
pub use scaleway_trait::ScalewayClientTrait;
pub use types::{Region, Zone};
#[cfg(feature = "test-util")]
pub use mock::MockScalewayClient;
