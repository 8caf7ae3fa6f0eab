use std::net::Ipv4Addr;

use ipnetwork::Ipv4Network;

use crate::{
    config::{Template, DEFAULT_SUBNET_POOL, DEFAULT_SUBNET_PREFIX},
    TopoboxError, TopoboxResult,
};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The address range networks without a declared CIDR are carved from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubnetPool {
    pool: Ipv4Network,
    prefix: u8,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl SubnetPool {
    /// Creates a pool handing out `/prefix` blocks of `pool`.
    pub fn new(pool: Ipv4Network, prefix: u8) -> TopoboxResult<Self> {
        if prefix < pool.prefix() || prefix > 32 {
            return Err(TopoboxError::custom(anyhow::anyhow!(
                "cannot carve /{prefix} subnets from {pool}"
            )));
        }

        Ok(Self { pool, prefix })
    }

    /// Returns the pool range.
    pub fn pool(&self) -> Ipv4Network {
        self.pool
    }

    /// Returns the prefix length of an allocated block.
    pub fn prefix(&self) -> u8 {
        self.prefix
    }

    /// Resolves the CIDR of every network of `template`, in template order.
    ///
    /// Declared CIDRs are kept as they are. Every other network gets the first block of the pool
    /// that overlaps neither `taken`, nor a CIDR declared in the template, nor a block handed out
    /// earlier in the same call.
    pub fn allocate(
        &self,
        template: &Template,
        taken: &[Ipv4Network],
    ) -> TopoboxResult<Vec<Ipv4Network>> {
        let mut used: Vec<Ipv4Network> = taken.to_vec();
        used.extend(template.get_networks().iter().filter_map(|n| *n.get_cidr()));

        let mut cidrs = Vec::with_capacity(template.get_networks().len());
        for network in template.get_networks() {
            let cidr = match network.get_cidr() {
                Some(cidr) => *cidr,
                None => {
                    let block = self.next_free(&used)?;
                    tracing::debug!("allocated {} to network {}", block, network.get_name());
                    used.push(block);
                    block
                }
            };

            cidrs.push(cidr);
        }

        Ok(cidrs)
    }

    fn next_free(&self, used: &[Ipv4Network]) -> TopoboxResult<Ipv4Network> {
        let base = u64::from(u32::from(self.pool.network()));
        let block_size = 1u64 << (32 - self.prefix);
        let blocks = 1u64 << (self.prefix - self.pool.prefix());

        for i in 0..blocks {
            let addr = Ipv4Addr::from((base + i * block_size) as u32);
            let block = Ipv4Network::new(addr, self.prefix).map_err(TopoboxError::custom)?;
            if !used.iter().any(|cidr| overlaps(cidr, &block)) {
                return Ok(block);
            }
        }

        Err(TopoboxError::SubnetPoolExhausted(self.pool.to_string()))
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Returns `true` if the two networks share at least one address.
pub fn overlaps(a: &Ipv4Network, b: &Ipv4Network) -> bool {
    a.contains(b.network()) || b.contains(a.network())
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl Default for SubnetPool {
    fn default() -> Self {
        Self {
            pool: *DEFAULT_SUBNET_POOL,
            prefix: DEFAULT_SUBNET_PREFIX,
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use crate::config::NetworkDef;

    use super::*;

    fn net(s: &str) -> Ipv4Network {
        s.parse().unwrap()
    }

    #[test]
    fn test_allocate_skips_taken_and_declared() {
        let template = Template::builder()
            .name("T")
            .networks(vec![
                NetworkDef::builder().name("a").build(),
                NetworkDef::builder().name("b").cidr(net("10.10.0.16/28")).build(),
                NetworkDef::builder().name("c").build(),
            ])
            .build();

        let cidrs = SubnetPool::default()
            .allocate(&template, &[net("10.10.0.0/28")])
            .unwrap();

        assert_eq!(
            cidrs,
            vec![net("10.10.0.32/28"), net("10.10.0.16/28"), net("10.10.0.48/28")]
        );
    }

    #[test]
    fn test_allocate_avoids_wider_taken_networks() {
        let template = Template::builder()
            .name("T")
            .networks(vec![NetworkDef::builder().name("a").build()])
            .build();

        let cidrs = SubnetPool::default()
            .allocate(&template, &[net("10.10.0.0/24")])
            .unwrap();

        assert_eq!(cidrs, vec![net("10.10.1.0/28")]);
    }

    #[test]
    fn test_allocate_exhaustion() {
        let pool = SubnetPool::new(net("192.168.0.0/30"), 31).unwrap();
        let template = Template::builder()
            .name("T")
            .networks(vec![
                NetworkDef::builder().name("a").build(),
                NetworkDef::builder().name("b").build(),
                NetworkDef::builder().name("c").build(),
            ])
            .build();

        assert!(matches!(
            pool.allocate(&template, &[]),
            Err(TopoboxError::SubnetPoolExhausted(pool)) if pool == "192.168.0.0/30"
        ));
    }

    #[test]
    fn test_subnet_pool_rejects_wide_prefix() {
        assert!(SubnetPool::new(net("10.0.0.0/24"), 16).is_err());
        assert!(SubnetPool::new(net("10.0.0.0/24"), 33).is_err());
        assert!(SubnetPool::new(net("10.0.0.0/24"), 24).is_ok());
    }

    #[test]
    fn test_overlaps() {
        assert!(overlaps(&net("10.0.0.0/16"), &net("10.0.5.0/24")));
        assert!(overlaps(&net("10.0.5.0/24"), &net("10.0.0.0/16")));
        assert!(!overlaps(&net("10.0.0.0/24"), &net("10.0.1.0/24")));
    }
}
