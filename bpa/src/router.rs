/*!
The routing table, per §3.9/§4.G: a bounded, linearly-scanned table of
`(dest, mask, intf_id)` triples. Every entry whose `dest & mask ==
triple.dest` matches is a candidate; among candidates, the one with the
most-specific (most bits set) mask wins, independent of insertion order
(see S4).
*/
use std::sync::RwLock;

use crate::error::Error;
use crate::flow::{Flow, StateFlags};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Route {
    dest: u64,
    mask: u64,
    intf_id: u32,
}

struct Interface {
    intf_id: u32,
    flow: Flow,
}

/// The destination routing table and interface registry.
pub struct Router {
    max_routes: usize,
    routes: RwLock<Vec<Route>>,
    interfaces: RwLock<Vec<Interface>>,
    next_intf_id: std::sync::atomic::AtomicU32,
}

impl Router {
    pub fn new(max_routes: usize) -> Self {
        Self {
            max_routes,
            routes: RwLock::new(Vec::new()),
            interfaces: RwLock::new(Vec::new()),
            next_intf_id: std::sync::atomic::AtomicU32::new(1),
        }
    }

    /// Inserts a route, scanned in insertion order on lookup.
    pub fn route_add(&self, dest: u64, mask: u64, intf_id: u32) -> Result<(), Error> {
        let mut routes = self.routes.write().unwrap();
        if routes.len() >= self.max_routes {
            return Err(Error::RouteTableFull);
        }
        routes.push(Route {
            dest,
            mask,
            intf_id,
        });
        Ok(())
    }

    /// Removes the first matching `(dest, mask, intf_id)` triple.
    pub fn route_del(&self, dest: u64, mask: u64, intf_id: u32) -> Result<(), Error> {
        let mut routes = self.routes.write().unwrap();
        let target = Route {
            dest,
            mask,
            intf_id,
        };
        let pos = routes.iter().position(|r| *r == target).ok_or(Error::NoSuchRoute)?;
        routes.remove(pos);
        Ok(())
    }

    /// Linear scan for the route whose mask matches `dest_node` and whose
    /// interface's state flags satisfy `(flags & flag_mask) ==
    /// required_flags`, per §3.9: among all matching routes the one with
    /// the most-specific mask (most bits set) wins, not merely the first
    /// inserted — a tie between equally specific masks favors whichever
    /// was inserted last.
    pub fn next_intf(
        &self,
        dest_node: u64,
        required_flags: StateFlags,
        flag_mask: StateFlags,
    ) -> Option<u32> {
        let routes = self.routes.read().unwrap();
        let interfaces = self.interfaces.read().unwrap();
        routes
            .iter()
            .filter(|r| {
                (dest_node & r.mask) == r.dest
                    && interfaces.iter().any(|i| {
                        i.intf_id == r.intf_id
                            && StateFlags::from_bits(i.flow.state_flags().bits() & flag_mask.bits())
                                == required_flags
                    })
            })
            .max_by_key(|r| r.mask.count_ones())
            .map(|r| r.intf_id)
    }

    /// Registers a flow, taking ownership of it, and returns its handle.
    /// The assigned handle is authoritative; any `intf_id` the flow was
    /// constructed with is cosmetic only.
    pub fn register_intf(&self, flow: Flow) -> u32 {
        let intf_id = self
            .next_intf_id
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        self.interfaces
            .write()
            .unwrap()
            .push(Interface { intf_id, flow });
        intf_id
    }

    /// Removes an interface, draining its flow and notifying its event
    /// handler via a down transition.
    pub fn del_intf(&self, intf_id: u32) -> Result<(), Error> {
        let mut interfaces = self.interfaces.write().unwrap();
        let pos = interfaces
            .iter()
            .position(|i| i.intf_id == intf_id)
            .ok_or(Error::NoSuchInterface)?;
        let removed = interfaces.remove(pos);
        removed.flow.modify_flags(StateFlags::empty(), StateFlags::UP);
        Ok(())
    }

    pub fn with_interface<R>(&self, intf_id: u32, f: impl FnOnce(&Flow) -> R) -> Option<R> {
        let interfaces = self.interfaces.read().unwrap();
        interfaces
            .iter()
            .find(|i| i.intf_id == intf_id)
            .map(|i| f(&i.flow))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s4_route_specificity() {
        let router = Router::new(8);
        let a = router.register_intf(Flow::new(0, 4));
        let b = router.register_intf(Flow::new(0, 4));
        router.with_interface(a, |f| f.modify_flags(StateFlags::UP, StateFlags::empty()));
        router.with_interface(b, |f| f.modify_flags(StateFlags::UP, StateFlags::empty()));

        router.route_add(0, 0, a).unwrap();
        router.route_add(1000, u64::MAX, b).unwrap();

        assert_eq!(router.next_intf(1000, StateFlags::UP, StateFlags::UP), Some(b));
        assert_eq!(router.next_intf(2000, StateFlags::UP, StateFlags::UP), Some(a));
    }

    #[test]
    fn full_table_rejects_new_routes() {
        let router = Router::new(1);
        router.route_add(1, 1, 1).unwrap();
        assert!(matches!(router.route_add(2, 2, 2), Err(Error::RouteTableFull)));
    }

    #[test]
    fn deleting_unknown_route_is_an_error() {
        let router = Router::new(4);
        assert!(matches!(router.route_del(1, 1, 1), Err(Error::NoSuchRoute)));
    }

    #[test]
    fn down_interface_is_skipped() {
        let router = Router::new(4);
        let a = router.register_intf(Flow::new(0, 4));
        router.route_add(0, 0, a).unwrap();
        // Interface never brought up: no match.
        assert_eq!(router.next_intf(5, StateFlags::UP, StateFlags::UP), None);
    }
}
