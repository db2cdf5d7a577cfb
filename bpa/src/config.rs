/*!
Engine configuration, per §6.4. This is a plain, constructor-free struct:
loading it from a file or CLI flags is the embedding application's job,
not this crate's.
*/

/// The custody ID ring's behaviour once `active_table_size` in-flight
/// bundles are outstanding. Per the open question in §9, all three are
/// implemented and `Resend` is the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CustodyWrapPolicy {
    /// Re-push the oldest entry's bundle to egress and recycle its slot.
    #[default]
    Resend,
    /// Refuse new custody-tracked acceptances until a slot frees up.
    Block,
    /// Drop the new bundle's custody tracking; it is still forwarded, but
    /// without retransmission.
    Drop,
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Bytes in the memory pool's content-block arena.
    pub cache_mem_size: usize,
    /// Routing table capacity, in `(dest, mask, intf)` triples.
    pub max_routes: usize,
    /// Custody acknowledgement emission period.
    pub ack_rate_ms: u64,
    /// Maximum sequence numbers batched per custody acknowledgement
    /// record, per §3.5.
    pub ack_batch_size: usize,
    /// Custody ID ring capacity.
    pub active_table_size: usize,
    /// Per-bundle payload size limit; exceeding it is `BundleTooLarge`,
    /// never fragmented.
    pub max_bundle_length: usize,
    /// Depth of each flow's ingress/egress subqueues by default; a flow
    /// may be reconfigured individually after creation.
    pub default_flow_depth: usize,
    pub custody_wrap_policy: CustodyWrapPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_mem_size: 4 * 1024 * 1024,
            max_routes: 64,
            ack_rate_ms: 5_000,
            ack_batch_size: 32,
            active_table_size: 256,
            max_bundle_length: 1024 * 1024,
            default_flow_depth: 16,
            custody_wrap_policy: CustodyWrapPolicy::Resend,
        }
    }
}
