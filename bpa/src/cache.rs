/*!
The storage-and-forward cache, per §3.10 (state)/§4.F (protocol): indexed
retention of bundles by destination, a pending/idle split for delivery
attempts, an active custody table for in-flight retransmission, and the
maintenance loop that drives all three.

§9 calls out the source's red-black tree as a capability to re-architect
rather than carry over verbatim; a `HashMap` keyed by `(node, service)`
gives the same "destination-indexed retention" behaviour the protocol
needs without requiring an ordered-by-key traversal anywhere in this
engine, so that's what `entries` is built on here.
*/
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use hashbrown::HashMap;
use tracing::{debug, warn};

use skua_bpv7::block::Block;
use skua_bpv7::block_type::BlockType;
use skua_bpv7::creation_timestamp::CreationTimestamp;
use skua_bpv7::crc::CrcType;
use skua_bpv7::custody_tracking::CustodyTracking;
use skua_bpv7::dtn_time::DtnTime;
use skua_bpv7::eid::Eid;
use skua_bpv7::flags::{BlockFlags, BundleFlags};
use skua_bpv7::hop_count::HopInfo;
use skua_bpv7::primary_block::PrimaryBlock;
use skua_bpv7::{decode_bundle, encode_bundle, Bundle};

use crate::config::{Config, CustodyWrapPolicy};
use crate::custody::CustodyMachine;
use crate::error::{Diagnostics, Error};
use crate::flow::{Deadline, StateFlags};
use crate::pool::{BlockTag, Pool};
use crate::router::Router;

/// Destination key entries are indexed by: `(node, service)`. Only `ipn`
/// destinations are addressable bundle destinations in this engine.
type DestKey = (u64, u64);

fn dest_key(eid: &Eid) -> Option<DestKey> {
    match eid {
        Eid::Ipn { node, service } => Some((*node, *service)),
        Eid::Null => None,
    }
}

fn now_as_dtn_time() -> DtnTime {
    let ms = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);
    DtnTime::from_unix_millis(ms)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryState {
    Pending,
    Idle { custody_id: Option<u64> },
}

#[derive(Clone, Copy)]
struct Entry {
    destination: Eid,
    deadline: Instant,
    priority: u8,
    custody_requested: bool,
    state: EntryState,
    retransmit_time: Instant,
    accepted_at: Instant,
    rewritten_for_forward: bool,
}

struct ActiveSlot {
    head: crate::pool::BlockId,
}

struct CacheInner {
    entries: HashMap<DestKey, Vec<crate::pool::BlockId>>,
    by_id: HashMap<crate::pool::BlockId, Entry>,
    pending: VecDeque<crate::pool::BlockId>,
    active: Vec<Option<ActiveSlot>>,
    oldest_custody_id: u64,
    current_custody_id: u64,
    custody: CustodyMachine,
}

/// The bundle storage-and-forward cache.
pub struct Cache {
    pool: Pool,
    router: Router,
    local_node: u64,
    config: Config,
    local_delivery: crate::flow::Subqueue,
    retransmit_interval: Duration,
    inner: Mutex<CacheInner>,
}

impl Cache {
    pub fn new(local_node: u64, config: Config) -> Self {
        let pool = Pool::create(config.cache_mem_size);
        let router = Router::new(config.max_routes);
        let active_table_size = config.active_table_size;
        let custody = CustodyMachine::new(
            config.ack_batch_size,
            Duration::from_millis(config.ack_rate_ms),
        );
        Self {
            pool,
            router,
            local_node,
            local_delivery: crate::flow::Subqueue::new(config.default_flow_depth),
            retransmit_interval: Duration::from_millis(config.ack_rate_ms.max(1)),
            config,
            inner: Mutex::new(CacheInner {
                entries: HashMap::new(),
                by_id: HashMap::new(),
                pending: VecDeque::new(),
                active: (0..active_table_size).map(|_| None).collect(),
                oldest_custody_id: 0,
                current_custody_id: 0,
                custody,
            }),
        }
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    pub fn mem_current_use(&self) -> usize {
        self.pool.mem_current_use()
    }

    /// Pulls one delivered bundle off the local delivery queue,
    /// reconstructing it from the pool.
    pub fn recv(&self, deadline: Deadline) -> Option<Bundle> {
        match self.local_delivery.pull(deadline) {
            crate::flow::PullResult::Pulled(head) => {
                let bytes = self.pool.stream_read(head);
                self.pool.recycle(head);
                decode_bundle(bytes).ok()
            }
            crate::flow::PullResult::TimedOut => None,
        }
    }

    /// Runs the full ingress protocol from §4.F on a just-received,
    /// still-encoded bundle: hop count / lifetime validation, then
    /// either local delivery or insertion into the pending entries for
    /// forwarding.
    pub fn accept(
        &self,
        bytes: Vec<u8>,
        now: Instant,
        diagnostics: &mut Diagnostics,
    ) -> Result<(), Error> {
        let wire = bytes.clone();
        let bundle = decode_bundle(bytes)?;
        self.accept_bundle(bundle, wire, now, diagnostics)
    }

    fn accept_bundle(
        &self,
        bundle: Bundle,
        wire: Vec<u8>,
        now: Instant,
        diagnostics: &mut Diagnostics,
    ) -> Result<(), Error> {
        if let Some(hop_block) = bundle.block_of_type(BlockType::HopCount) {
            if let Ok(info) = skua_cbor::decode::parse::<HopInfo>(bundle.block_bytes(hop_block)) {
                if info.exceeded() {
                    diagnostics.raise(Diagnostics::HOP_LIMIT_EXCEEDED);
                    debug!(source = %bundle.primary.source, "dropping bundle: hop limit exceeded");
                    return Err(Error::Expired);
                }
            }
        }

        let lifetime_deadline = now
            .checked_add(Duration::from_millis(bundle.primary.lifetime_ms))
            .unwrap_or(now);
        if lifetime_deadline <= now {
            debug!(source = %bundle.primary.source, "dropping bundle: lifetime already elapsed");
            return Err(Error::Expired);
        }

        if bundle.payload_bytes().is_none() {
            return Err(Error::ParmErr("bundle has no payload"));
        }

        let custody_requested = bundle.primary.flags.contains(BundleFlags::APP_ACK_REQUESTED);
        let destination = bundle.primary.destination;
        let source = bundle.primary.source;
        let seq = bundle.primary.creation_timestamp.sequence_number;

        let is_local = dest_key(&destination).map(|(n, _)| n) == Some(self.local_node);

        if is_local {
            let head = self.store_bytes(&wire, BlockTag::Canonical)?;
            if let crate::flow::PushResult::TimedOut =
                self.local_delivery.push(head, Duration::ZERO)
            {
                self.pool.recycle(head);
                return Err(Error::StoreFailure);
            }
            if custody_requested {
                let mut inner = self.inner.lock().unwrap();
                let record = inner.custody.accept(source, seq, true, now, diagnostics);
                drop(inner);
                if let Some(record) = record {
                    self.emit_ack(record);
                }
            }
            return Ok(());
        }

        self.store_for_forward(
            &wire,
            destination,
            source,
            seq,
            lifetime_deadline,
            custody_requested,
            now,
            diagnostics,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn store_for_forward(
        &self,
        wire: &[u8],
        destination: Eid,
        source: Eid,
        seq: u64,
        deadline: Instant,
        custody_requested: bool,
        now: Instant,
        diagnostics: &mut Diagnostics,
    ) -> Result<(), Error> {
        let head = self.store_bytes(wire, BlockTag::Primary)?;

        let key = dest_key(&destination);
        let mut inner = self.inner.lock().unwrap();
        if let Some(key) = key {
            inner.entries.entry(key).or_default().push(head);
        }
        inner.pending.push_back(head);
        inner.by_id.insert(
            head,
            Entry {
                destination,
                deadline,
                priority: 0,
                custody_requested,
                state: EntryState::Pending,
                retransmit_time: now,
                accepted_at: now,
                rewritten_for_forward: false,
            },
        );

        if custody_requested {
            let record = inner.custody.accept(source, seq, false, now, diagnostics);
            drop(inner);
            if let Some(record) = record {
                self.emit_ack(record);
            }
        }
        Ok(())
    }

    fn store_bytes(&self, bytes: &[u8], tag: BlockTag) -> Result<crate::pool::BlockId, Error> {
        if bytes.len() > self.config.max_bundle_length {
            return Err(Error::BundleTooLarge(bytes.len(), self.config.max_bundle_length));
        }
        let head = self.pool.alloc(tag).ok_or(Error::StoreFailure)?;
        if let Err(e) = self.pool.stream_write(head, bytes) {
            self.pool.recycle(head);
            return Err(e);
        }
        Ok(head)
    }

    /// Builds and routes a custody acknowledgement bundle back to its
    /// originating peer. Best-effort: if no route exists the
    /// acknowledgement is simply dropped, since retrying is a routing
    /// concern this engine doesn't implement.
    fn emit_ack(&self, record: skua_bpv7::admin_record::AdminRecord) {
        let dest = match &record {
            skua_bpv7::admin_record::AdminRecord::CustodyAcknowledgement(ack) => ack.source,
            skua_bpv7::admin_record::AdminRecord::Unrecognised(_) => return,
        };
        let (body, _) = skua_cbor::encode::emit(&record);
        let primary = PrimaryBlock {
            flags: BundleFlags::ADMIN_RECORD,
            crc_type: CrcType::Crc16X25,
            destination: dest,
            source: Eid::Ipn {
                node: self.local_node,
                service: 0,
            },
            report_to: Eid::Null,
            creation_timestamp: CreationTimestamp {
                time: now_as_dtn_time(),
                sequence_number: 0,
            },
            lifetime_ms: self.config.ack_rate_ms.max(60_000),
            fragment_info: None,
        };
        let payload = Block::encode(
            BlockType::Payload,
            1,
            BlockFlags::empty(),
            CrcType::Crc16X25,
            &body,
        );
        let wire = encode_bundle(&primary, &[payload]);

        let Ok(head) = self.store_bytes(&wire, BlockTag::Canonical) else {
            return;
        };
        let routed = dest_key(&dest)
            .and_then(|(node, _)| self.router.next_intf(node, StateFlags::UP, StateFlags::UP));
        match routed {
            Some(intf_id) => {
                self.router
                    .with_interface(intf_id, |flow| flow.egress.push(head, Duration::ZERO));
            }
            None => {
                warn!(%dest, "no route for custody acknowledgement, dropping");
                self.pool.recycle(head);
            }
        }
    }

    /// Runs one pass of the maintenance loop: routes pending entries,
    /// retransmits or expires active-table entries, and lets the custody
    /// machine emit any overdue batches.
    pub fn run_maintenance(&self, now: Instant, diagnostics: &mut Diagnostics) {
        self.drain_pending(now);
        self.walk_active_table(now);

        let mut inner = self.inner.lock().unwrap();
        let acks = inner.custody.poll(now, diagnostics);
        drop(inner);
        for ack in acks {
            self.emit_ack(ack);
        }
    }

    fn drain_pending(&self, now: Instant) {
        let mut inner = self.inner.lock().unwrap();
        let mut still_pending = VecDeque::new();
        while let Some(head) = inner.pending.pop_front() {
            let Some(entry) = inner.by_id.get(&head).copied() else {
                continue;
            };
            if entry.deadline <= now {
                self.relinquish_locked(&mut inner, head);
                continue;
            }
            let Some((node, _)) = dest_key(&entry.destination) else {
                still_pending.push_back(head);
                continue;
            };
            let intf = self.router.next_intf(node, StateFlags::UP, StateFlags::UP);
            let Some(intf_id) = intf else {
                still_pending.push_back(head);
                continue;
            };
            if entry.custody_requested
                && self.config.custody_wrap_policy == CustodyWrapPolicy::Block
                && self.ring_full_locked(&inner)
            {
                still_pending.push_back(head);
                continue;
            }

            let forward_head = if entry.rewritten_for_forward {
                head
            } else {
                match self.rewrite_for_forward(head, entry.accepted_at, now) {
                    Some(new_head) => {
                        self.pool.recycle(head);
                        inner.by_id.remove(&head);
                        if let Some(key) = dest_key(&entry.destination) {
                            if let Some(list) = inner.entries.get_mut(&key) {
                                if let Some(slot) = list.iter_mut().find(|h| **h == head) {
                                    *slot = new_head;
                                }
                            }
                        }
                        inner.by_id.insert(
                            new_head,
                            Entry {
                                rewritten_for_forward: true,
                                ..entry
                            },
                        );
                        new_head
                    }
                    None => head,
                }
            };

            self.router
                .with_interface(intf_id, |flow| flow.egress.push(forward_head, Duration::ZERO));
            let custody_id = if entry.custody_requested {
                self.assign_custody_id_locked(&mut inner, forward_head)
            } else {
                None
            };
            if let Some(entry) = inner.by_id.get_mut(&forward_head) {
                entry.state = EntryState::Idle { custody_id };
            }
        }
        inner.pending = still_pending;
    }

    /// Rewrites `previous_node` to name this node, advances any
    /// `bundle_age` block by the time spent resident in the cache, and
    /// replaces a custody-tracking block's current custodian with this
    /// node, per RFC 9171 §4.4 forwarding behaviour and §4.F step 3
    /// ("if the bundle carried a custody block requesting tracking,
    /// replace its current-custodian endpoint with the local node's
    /// before forwarding"). Returns `None` (forward the stored bytes
    /// unchanged) if the stored bytes fail to decode, which should not
    /// happen for bytes this cache itself validated on ingress.
    fn rewrite_for_forward(
        &self,
        head: crate::pool::BlockId,
        accepted_at: Instant,
        now: Instant,
    ) -> Option<crate::pool::BlockId> {
        let wire = self.pool.stream_read(head);
        let bundle = decode_bundle(wire).ok()?;
        if !bundle.blocks.iter().any(|b| {
            matches!(
                b.block_type,
                BlockType::PreviousNode | BlockType::BundleAge | BlockType::CustodyTracking
            )
        }) {
            return None;
        }

        let elapsed_ms = now.saturating_duration_since(accepted_at).as_millis() as u64;
        let local = Eid::Ipn {
            node: self.local_node,
            service: 0,
        };
        let mut canonical = Vec::with_capacity(bundle.blocks.len());
        for block in &bundle.blocks {
            match block.block_type {
                BlockType::PreviousNode => {
                    let (content, _) = skua_cbor::encode::emit(&local);
                    canonical.push(Block::encode(
                        block.block_type,
                        block.number,
                        block.flags,
                        block.crc_type,
                        &content,
                    ));
                }
                BlockType::BundleAge => {
                    let stored: u64 =
                        skua_cbor::decode::parse(bundle.block_bytes(block)).unwrap_or(0);
                    let (content, _) = skua_cbor::encode::emit(&(stored + elapsed_ms));
                    canonical.push(Block::encode(
                        block.block_type,
                        block.number,
                        block.flags,
                        block.crc_type,
                        &content,
                    ));
                }
                BlockType::CustodyTracking => {
                    let (content, _) = skua_cbor::encode::emit(&CustodyTracking {
                        current_custodian: local,
                    });
                    canonical.push(Block::encode(
                        block.block_type,
                        block.number,
                        block.flags,
                        block.crc_type,
                        &content,
                    ));
                }
                _ => canonical.push(bundle.block_extent(block).to_vec()),
            }
        }
        let rewritten = encode_bundle(&bundle.primary, &canonical);
        self.store_bytes(&rewritten, BlockTag::Primary).ok()
    }

    fn ring_full_locked(&self, inner: &CacheInner) -> bool {
        !inner.active.is_empty()
            && inner.current_custody_id - inner.oldest_custody_id >= inner.active.len() as u64
    }

    /// Assigns the next custody ID to `head`, applying the configured
    /// wrap policy (§9) when the ring is already full:
    /// `Resend`/`Drop` both displace the oldest slot and reuse it (the
    /// difference is only that a displaced `Resend` entry keeps its own
    /// retransmit timer running via the active-table walk, while a
    /// displaced `Drop` entry has already lost its slot and so is never
    /// retransmitted again); `Block` is rejected by the caller before
    /// this is reached and never observes a full ring here.
    fn assign_custody_id_locked(
        &self,
        inner: &mut CacheInner,
        head: crate::pool::BlockId,
    ) -> Option<u64> {
        let len = inner.active.len().max(1);
        let id = inner.current_custody_id;
        let slot = (id as usize) % len;
        if inner.active[slot].is_some() {
            inner.oldest_custody_id = inner
                .oldest_custody_id
                .max(id.saturating_sub(len as u64 - 1));
        }
        inner.active[slot] = Some(ActiveSlot { head });
        inner.current_custody_id += 1;
        Some(id)
    }

    fn walk_active_table(&self, now: Instant) {
        let mut inner = self.inner.lock().unwrap();
        let len = inner.active.len();
        if len == 0 {
            return;
        }
        let slot_idx = (inner.oldest_custody_id as usize) % len;
        let Some(head) = inner.active[slot_idx].as_ref().map(|s| s.head) else {
            return;
        };
        let Some(entry) = inner.by_id.get(&head) else {
            inner.active[slot_idx] = None;
            inner.oldest_custody_id += 1;
            return;
        };
        if entry.deadline <= now {
            inner.active[slot_idx] = None;
            inner.oldest_custody_id += 1;
            self.relinquish_locked(&mut inner, head);
            return;
        }
        if entry.retransmit_time <= now {
            let node = dest_key(&entry.destination).map(|(n, _)| n);
            if let Some(node) = node {
                if let Some(intf_id) = self.router.next_intf(node, StateFlags::UP, StateFlags::UP) {
                    self.router
                        .with_interface(intf_id, |flow| flow.egress.push(head, Duration::ZERO));
                }
            }
            if let Some(entry) = inner.by_id.get_mut(&head) {
                entry.retransmit_time = now + self.retransmit_interval;
            }
        }
    }

    fn relinquish_locked(&self, inner: &mut CacheInner, head: crate::pool::BlockId) {
        if let Some(entry) = inner.by_id.remove(&head) {
            if let Some(key) = dest_key(&entry.destination) {
                if let Some(list) = inner.entries.get_mut(&key) {
                    list.retain(|h| *h != head);
                    if list.is_empty() {
                        inner.entries.remove(&key);
                    }
                }
            }
        }
        self.pool.recycle(head);
    }

    /// Evicts the lowest-priority pending/idle entry not currently in the
    /// active retransmission window, for use when a high-priority
    /// allocation finds the pool empty.
    pub fn evict_one(&self) -> bool {
        let mut inner = self.inner.lock().unwrap();
        let active_heads: std::collections::HashSet<_> = inner
            .active
            .iter()
            .filter_map(|s| s.as_ref().map(|s| s.head))
            .collect();

        let victim = inner
            .by_id
            .iter()
            .filter(|(head, _)| !active_heads.contains(head))
            .min_by_key(|(_, e)| (e.priority, std::cmp::Reverse(e.deadline)))
            .map(|(head, _)| *head);

        match victim {
            Some(head) => {
                self.relinquish_locked(&mut inner, head);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wire(dest: Eid, source: Eid, lifetime_ms: u64, payload: &[u8]) -> Vec<u8> {
        let primary = PrimaryBlock {
            flags: BundleFlags::empty(),
            crc_type: CrcType::Crc16X25,
            destination: dest,
            source,
            report_to: Eid::Null,
            creation_timestamp: CreationTimestamp {
                time: DtnTime(1_000),
                sequence_number: 1,
            },
            lifetime_ms,
            fragment_info: None,
        };
        let payload_block = Block::encode(
            BlockType::Payload,
            1,
            BlockFlags::empty(),
            CrcType::Crc16X25,
            payload,
        );
        encode_bundle(&primary, &[payload_block])
    }

    #[test]
    fn s1_local_destination_is_delivered() {
        let cache = Cache::new(20, Config::default());
        let mut diag = Diagnostics::empty();
        let bytes = wire(
            Eid::Ipn { node: 20, service: 2 },
            Eid::Ipn { node: 10, service: 1 },
            60_000,
            b"hello",
        );
        cache.accept(bytes, Instant::now(), &mut diag).unwrap();

        let bundle = cache.recv(Duration::ZERO).unwrap();
        assert_eq!(bundle.payload_bytes(), Some(&b"hello"[..]));
    }

    #[test]
    fn s5_expired_bundle_is_relinquished_on_maintenance() {
        let cache = Cache::new(99, Config::default());
        let mut diag = Diagnostics::empty();
        let bytes = wire(
            Eid::Ipn { node: 20, service: 2 },
            Eid::Ipn { node: 10, service: 1 },
            1_000,
            b"x",
        );
        let baseline = cache.mem_current_use();
        let t0 = Instant::now();
        cache.accept(bytes, t0, &mut diag).unwrap();
        assert_ne!(cache.mem_current_use(), baseline);

        cache.run_maintenance(t0 + Duration::from_millis(1_001), &mut diag);
        assert_eq!(cache.mem_current_use(), baseline);
    }

    #[test]
    fn s6_hop_limit_exceeded_bundle_is_rejected() {
        let cache = Cache::new(99, Config::default());
        let mut diag = Diagnostics::empty();

        let primary = PrimaryBlock {
            flags: BundleFlags::empty(),
            crc_type: CrcType::Crc16X25,
            destination: Eid::Ipn { node: 20, service: 2 },
            source: Eid::Ipn { node: 10, service: 1 },
            report_to: Eid::Null,
            creation_timestamp: CreationTimestamp {
                time: DtnTime(1_000),
                sequence_number: 1,
            },
            lifetime_ms: 60_000,
            fragment_info: None,
        };
        let (hop_bytes, _) = skua_cbor::encode::emit(&HopInfo { limit: 1, count: 1 });
        let hop_block = Block::encode(
            BlockType::HopCount,
            2,
            BlockFlags::empty(),
            CrcType::None,
            &hop_bytes,
        );
        let payload_block = Block::encode(
            BlockType::Payload,
            1,
            BlockFlags::empty(),
            CrcType::Crc16X25,
            b"x",
        );
        let bytes = encode_bundle(&primary, &[hop_block, payload_block]);

        let baseline = cache.mem_current_use();
        let err = cache.accept(bytes, Instant::now(), &mut diag).unwrap_err();
        assert!(matches!(err, Error::Expired));
        assert!(diag.contains(Diagnostics::HOP_LIMIT_EXCEEDED));
        assert_eq!(cache.mem_current_use(), baseline);
        assert!(cache.recv(Duration::ZERO).is_none());
    }

    #[test]
    fn remote_destination_is_routed_when_interface_comes_up() {
        let cache = Cache::new(99, Config::default());
        let mut diag = Diagnostics::empty();
        let intf = cache.router().register_intf(crate::flow::Flow::new(0, 4));
        cache
            .router()
            .with_interface(intf, |f| f.modify_flags(StateFlags::UP, StateFlags::empty()));
        cache.router().route_add(20, 0, intf).unwrap();

        let bytes = wire(
            Eid::Ipn { node: 20, service: 2 },
            Eid::Ipn { node: 10, service: 1 },
            60_000,
            b"x",
        );
        cache.accept(bytes, Instant::now(), &mut diag).unwrap();
        cache.run_maintenance(Instant::now(), &mut diag);

        let delivered = cache
            .router()
            .with_interface(intf, |f| !f.egress.is_empty())
            .unwrap();
        assert!(delivered);
    }

    #[test]
    fn custody_tracking_block_is_rewritten_to_the_local_custodian_on_forward() {
        let cache = Cache::new(99, Config::default());
        let mut diag = Diagnostics::empty();
        let intf = cache.router().register_intf(crate::flow::Flow::new(0, 4));
        cache
            .router()
            .with_interface(intf, |f| f.modify_flags(StateFlags::UP, StateFlags::empty()));
        cache.router().route_add(30, 0, intf).unwrap();

        let primary = PrimaryBlock {
            flags: BundleFlags::empty(),
            crc_type: CrcType::Crc16X25,
            destination: Eid::Ipn { node: 30, service: 1 },
            source: Eid::Ipn { node: 10, service: 1 },
            report_to: Eid::Null,
            creation_timestamp: CreationTimestamp {
                time: DtnTime(1_000),
                sequence_number: 1,
            },
            lifetime_ms: 60_000,
            fragment_info: None,
        };
        let (custody_bytes, _) = skua_cbor::encode::emit(&CustodyTracking {
            current_custodian: Eid::Ipn { node: 5, service: 0 },
        });
        let custody_block = Block::encode(
            BlockType::CustodyTracking,
            2,
            BlockFlags::empty(),
            CrcType::None,
            &custody_bytes,
        );
        let payload_block = Block::encode(
            BlockType::Payload,
            1,
            BlockFlags::empty(),
            CrcType::Crc16X25,
            b"x",
        );
        let bytes = encode_bundle(&primary, &[custody_block, payload_block]);

        cache.accept(bytes, Instant::now(), &mut diag).unwrap();
        cache.run_maintenance(Instant::now(), &mut diag);

        let head = cache
            .router()
            .with_interface(intf, |f| f.egress.pull(Duration::ZERO))
            .unwrap();
        let crate::flow::PullResult::Pulled(head) = head else {
            panic!("expected a forwarded bundle on egress");
        };
        let forwarded = decode_bundle(cache.pool().stream_read(head)).unwrap();
        let block = forwarded
            .blocks
            .iter()
            .find(|b| b.block_type == BlockType::CustodyTracking)
            .unwrap();
        let tracking: CustodyTracking =
            skua_cbor::decode::parse(forwarded.block_bytes(block)).unwrap();
        assert_eq!(
            tracking.current_custodian,
            Eid::Ipn { node: 99, service: 0 }
        );
    }
}
