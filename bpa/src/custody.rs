/*!
The custody acknowledgement machine, per §3.10/§4.H: per-peer
accumulators that batch accepted sequence numbers into admin-record
custody acknowledgement bundles, built by the cache's maintenance loop
and handed to the router's egress path.
*/
use std::collections::HashMap;
use std::time::Instant;

use skua_bpv7::admin_record::{AdminRecord, CustodyAcknowledgement, MAX_SEQS_PER_ACK};
use skua_bpv7::eid::Eid;

use crate::error::Diagnostics;

/// One flow-source's in-progress custody acknowledgement batch.
struct Accumulator {
    last_accepted_seq: u64,
    pending_seqs: Vec<u64>,
    delivered: bool,
    last_emit_time: Instant,
}

impl Accumulator {
    fn new(seq: u64, delivered: bool, now: Instant) -> Self {
        Self {
            last_accepted_seq: seq,
            pending_seqs: vec![seq],
            delivered,
            last_emit_time: now,
        }
    }
}

/// Owns one [`Accumulator`] per flow source and decides when each batch
/// is ready to emit as an admin-record bundle.
pub struct CustodyMachine {
    ack_batch_size: usize,
    ack_rate: std::time::Duration,
    peers: HashMap<Eid, Accumulator>,
}

impl CustodyMachine {
    pub fn new(ack_batch_size: usize, ack_rate: std::time::Duration) -> Self {
        Self {
            ack_batch_size: ack_batch_size.min(MAX_SEQS_PER_ACK),
            ack_rate,
            peers: HashMap::new(),
        }
    }

    /// Records that `seq` was accepted from `source`, with `delivered`
    /// indicating whether the bundle was delivered locally (`true`) or
    /// forwarded onward (`false`). Returns a ready-to-send record if this
    /// acceptance filled the batch, and raises non-fatal diagnostics for
    /// the conditions in §3.10/§4.H.
    pub fn accept(
        &mut self,
        source: Eid,
        seq: u64,
        delivered: bool,
        now: Instant,
        diagnostics: &mut Diagnostics,
    ) -> Option<AdminRecord> {
        let Some(acc) = self.peers.get_mut(&source) else {
            self.peers.insert(source, Accumulator::new(seq, delivered, now));
            return None;
        };

        if delivered != acc.delivered {
            diagnostics.raise(Diagnostics::MIXED_RESPONSE);
            let record = Self::build_record(source, acc);
            self.peers.insert(source, Accumulator::new(seq, delivered, now));
            return Some(record);
        }

        if seq <= acc.last_accepted_seq {
            diagnostics.raise(Diagnostics::CID_WENT_BACKWARDS);
        } else {
            acc.last_accepted_seq = seq;
        }
        acc.pending_seqs.push(seq);

        let batch_full = acc.pending_seqs.len() >= self.ack_batch_size;
        let rate_elapsed = now.duration_since(acc.last_emit_time) >= self.ack_rate;
        if batch_full || rate_elapsed {
            if batch_full {
                diagnostics.raise(Diagnostics::DACS_FULL);
            }
            let record = Self::build_record(source, acc);
            self.peers.remove(&source);
            return Some(record);
        }
        None
    }

    /// Called by the maintenance loop: emits every peer whose batch has
    /// aged past `ack_rate` even without a triggering `accept`.
    pub fn poll(&mut self, now: Instant, diagnostics: &mut Diagnostics) -> Vec<AdminRecord> {
        let due: Vec<Eid> = self
            .peers
            .iter()
            .filter(|(_, acc)| now.duration_since(acc.last_emit_time) >= self.ack_rate)
            .map(|(eid, _)| *eid)
            .collect();

        let mut out = Vec::with_capacity(due.len());
        for source in due {
            if let Some(mut acc) = self.peers.remove(&source) {
                if acc.pending_seqs.len() >= MAX_SEQS_PER_ACK {
                    diagnostics.raise(Diagnostics::FILL_OVERFLOW);
                    acc.pending_seqs.truncate(MAX_SEQS_PER_ACK);
                }
                out.push(Self::build_record(source, &acc));
            }
        }
        out
    }

    fn build_record(source: Eid, acc: &Accumulator) -> AdminRecord {
        AdminRecord::CustodyAcknowledgement(CustodyAcknowledgement {
            source,
            sequence_numbers: acc.pending_seqs.clone(),
        })
    }

    pub fn pending_peers(&self) -> usize {
        self.peers.len()
    }
}
