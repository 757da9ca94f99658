//! Prints the CustomResourceDefinition manifests for all CRDs to stdout.

use crds::{ScalewayCluster, ScalewayMachine};
use kube::CustomResourceExt;

fn main() -> Result<(), serde_yaml::Error> {
    print!("{}", serde_yaml::to_string(&ScalewayCluster::crd())?);
    println!("---");
    print!("{}", serde_yaml::to_string(&ScalewayMachine::crd())?);
    Ok(())
}
