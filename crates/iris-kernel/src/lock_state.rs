//! [`LockState`] – interlock reduction.
//!
//! A lock state accumulates boolean dependency facts gathered during a
//! dependency scan and reduces them to a single [`GateArmInterlock`].  It
//! holds no references to devices; every scan starts from a fresh value.
//!
//! | Fact | Effect |
//! |---|---|
//! | system disabled | `SYSTEM_DISABLE` (overrides everything) |
//! | opposing arm possibly open | deny open |
//! | downstream arm (or prerequisite array) possibly closed | deny open |
//! | upstream arm (or dependent array) possibly open | deny close |
//!
//! # Example
//!
//! ```
//! use iris_kernel::LockState;
//! use iris_types::GateArmInterlock;
//!
//! let mut lock = LockState::new(true);
//! assert_eq!(lock.interlock(), GateArmInterlock::None);
//!
//! lock.raise_opposing_open();
//! lock.raise_upstream_open();
//! assert_eq!(lock.interlock(), GateArmInterlock::DenyAll);
//! ```

use iris_types::GateArmInterlock;

/// Accumulator of interlock facts for one arm or array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LockState {
    opposing_open: bool,
    downstream_closed: bool,
    upstream_open: bool,
    system_enable: bool,
}

impl LockState {
    /// Fresh accumulator with no raised facts.
    pub fn new(system_enable: bool) -> Self {
        Self {
            system_enable,
            ..Self::default()
        }
    }

    /// Build a lock state directly from all four facts.
    pub fn from_facts(
        opposing_open: bool,
        downstream_closed: bool,
        upstream_open: bool,
        system_enable: bool,
    ) -> Self {
        Self {
            opposing_open,
            downstream_closed,
            upstream_open,
            system_enable,
        }
    }

    pub fn raise_opposing_open(&mut self) {
        self.opposing_open = true;
    }

    pub fn raise_downstream_closed(&mut self) {
        self.downstream_closed = true;
    }

    pub fn raise_upstream_open(&mut self) {
        self.upstream_open = true;
    }

    pub fn set_system_enable(&mut self, enable: bool) {
        self.system_enable = enable;
    }

    /// Fold another lock state into this one: facts are OR-ed, system enable
    /// is AND-ed.
    pub fn merge(&mut self, other: &LockState) {
        self.opposing_open |= other.opposing_open;
        self.downstream_closed |= other.downstream_closed;
        self.upstream_open |= other.upstream_open;
        self.system_enable &= other.system_enable;
    }

    pub fn is_opposing_open(&self) -> bool {
        self.opposing_open
    }

    pub fn is_downstream_closed(&self) -> bool {
        self.downstream_closed
    }

    pub fn is_upstream_open(&self) -> bool {
        self.upstream_open
    }

    pub fn is_system_enabled(&self) -> bool {
        self.system_enable
    }

    /// Opening is denied by an opposing open arm, a closed downstream arm,
    /// or a disabled system.
    pub fn is_open_denied(&self) -> bool {
        self.opposing_open || self.downstream_closed || !self.system_enable
    }

    /// Closing is denied only by an open upstream arm.  A disabled system is
    /// reported through the interlock, not as a close conflict.
    pub fn is_close_denied(&self) -> bool {
        self.upstream_open
    }

    /// Reduce the accumulated facts to an interlock value.
    pub fn interlock(&self) -> GateArmInterlock {
        if !self.system_enable {
            return GateArmInterlock::SystemDisable;
        }
        let deny_open = self.opposing_open || self.downstream_closed;
        let deny_close = self.upstream_open;
        match (deny_open, deny_close) {
            (true, true) => GateArmInterlock::DenyAll,
            (true, false) => GateArmInterlock::DenyOpen,
            (false, true) => GateArmInterlock::DenyClose,
            (false, false) => GateArmInterlock::None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_disabled_lock_is_system_disable() {
        assert_eq!(LockState::default().interlock(), GateArmInterlock::SystemDisable);
        assert_eq!(LockState::new(false).interlock(), GateArmInterlock::SystemDisable);
    }

    #[test]
    fn system_disable_overrides_all_facts() {
        let lock = LockState::from_facts(true, true, true, false);
        assert_eq!(lock.interlock(), GateArmInterlock::SystemDisable);
    }

    #[test]
    fn reduction_table() {
        use GateArmInterlock::*;
        let cases = [
            ((false, false, false), None),
            ((true, false, false), DenyOpen),
            ((false, true, false), DenyOpen),
            ((false, false, true), DenyClose),
            ((true, true, false), DenyOpen),
            ((true, false, true), DenyAll),
            ((false, true, true), DenyAll),
            ((true, true, true), DenyAll),
        ];
        for ((opp, down, up), expected) in cases {
            let lock = LockState::from_facts(opp, down, up, true);
            assert_eq!(lock.interlock(), expected, "facts {opp} {down} {up}");
        }
    }

    #[test]
    fn reduction_is_independent_of_raise_order() {
        let mut a = LockState::new(true);
        a.raise_upstream_open();
        a.raise_opposing_open();

        let mut b = LockState::new(true);
        b.raise_opposing_open();
        b.raise_upstream_open();
        b.raise_opposing_open();

        assert_eq!(a, b);
        assert_eq!(a.interlock(), b.interlock());
    }

    #[test]
    fn merge_ors_facts_and_ands_enable() {
        let mut array = LockState::new(true);
        let mut member = LockState::new(true);
        member.raise_downstream_closed();
        array.merge(&member);
        assert_eq!(array.interlock(), GateArmInterlock::DenyOpen);

        array.merge(&LockState::new(false));
        assert_eq!(array.interlock(), GateArmInterlock::SystemDisable);
    }

    #[test]
    fn conflict_predicates() {
        let mut lock = LockState::new(true);
        assert!(!lock.is_open_denied());
        assert!(!lock.is_close_denied());
        lock.raise_upstream_open();
        assert!(lock.is_close_denied());
        assert!(LockState::new(false).is_open_denied());
        assert!(!LockState::new(false).is_close_denied());
    }
}
