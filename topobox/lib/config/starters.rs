use std::collections::BTreeSet;

use super::{NetworkDef, NodeDef, Template};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

const STARTER_NETWORKS: [&str; 3] = ["mgmt", "private", "public"];

const STARTER_IMAGE: &str = "ubuntu";

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Returns the templates installed by `topobox setup`.
///
/// Starter networks leave their CIDR unset so every sandbox gets its own subnets.
pub fn starter_templates() -> Vec<Template> {
    vec![
        Template::builder()
            .name("all-in-one")
            .description("A single node housing all infrastructure services.")
            .networks(starter_networks())
            .nodes(vec![starter_node("aio", &["controller", "compute"])])
            .build(),
        Template::builder()
            .name("multi-one-control")
            .description("A single controller node and two compute nodes.")
            .networks(starter_networks())
            .nodes(vec![
                starter_node("controller", &["controller"]),
                starter_node("compute1", &["compute"]),
                starter_node("compute2", &["compute"]),
            ])
            .build(),
    ]
}

fn starter_networks() -> Vec<NetworkDef> {
    STARTER_NETWORKS
        .iter()
        .map(|name| NetworkDef::builder().name(*name).build())
        .collect()
}

fn starter_node(name: &str, services: &[&str]) -> NodeDef {
    NodeDef::builder()
        .name(name)
        .services(services.iter().map(|s| s.to_string()).collect::<BTreeSet<_>>())
        .networks(STARTER_NETWORKS.iter().map(|n| n.to_string()).collect())
        .image(STARTER_IMAGE)
        .cpus(2)
        .ram_mib(1024)
        .build()
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starter_templates_are_valid() {
        let starters = starter_templates();
        assert_eq!(starters.len(), 2);
        for template in &starters {
            template.validate().unwrap();
        }
        assert_eq!(starters[1].get_nodes().len(), 3);
    }
}
