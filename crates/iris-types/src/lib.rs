use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Maximum number of gate arms in one array.
pub const MAX_ARMS: usize = 8;

/// Maximum length of a persisted fault description.
pub const MAX_FAULT_LEN: usize = 32;

/// State of a gate arm (or the aggregate state of an array).
///
/// The ordinal encoding is persisted in the `arm_state` column, so variant
/// order must never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GateArmState {
    /// Hardware status not (yet) known; treated as unsafe.
    Unknown,
    /// Hardware reported a fault.
    Fault,
    Opening,
    Open,
    /// Operator requested close; warning messages are displayed, no hardware
    /// command has been sent yet.
    WarnClose,
    Closing,
    Closed,
}

impl GateArmState {
    const ALL: [GateArmState; 7] = [
        GateArmState::Unknown,
        GateArmState::Fault,
        GateArmState::Opening,
        GateArmState::Open,
        GateArmState::WarnClose,
        GateArmState::Closing,
        GateArmState::Closed,
    ];

    /// Integer encoding stored in the persistence layer.
    pub fn ordinal(self) -> i32 {
        self as i32
    }

    /// Decode a persisted ordinal.
    ///
    /// # Errors
    ///
    /// Returns [`GateArmError::InvalidOrdinal`] for out-of-range values.
    pub fn from_ordinal(ordinal: i32) -> Result<Self, GateArmError> {
        usize::try_from(ordinal)
            .ok()
            .and_then(|i| Self::ALL.get(i).copied())
            .ok_or(GateArmError::InvalidOrdinal(ordinal))
    }

    /// Anything other than a confirmed `CLOSED` may be letting traffic through.
    pub fn is_possibly_open(self) -> bool {
        self != GateArmState::Closed
    }

    /// Anything other than a confirmed `OPEN` may be blocking the road.
    pub fn is_possibly_closed(self) -> bool {
        self != GateArmState::Open
    }

    pub fn is_moving(self) -> bool {
        matches!(self, GateArmState::Opening | GateArmState::Closing)
    }

    /// `UNKNOWN` and `FAULT` are the unsafe, non-terminal states.
    pub fn is_unsafe(self) -> bool {
        matches!(self, GateArmState::Unknown | GateArmState::Fault)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            GateArmState::Unknown => "UNKNOWN",
            GateArmState::Fault => "FAULT",
            GateArmState::Opening => "OPENING",
            GateArmState::Open => "OPEN",
            GateArmState::WarnClose => "WARN_CLOSE",
            GateArmState::Closing => "CLOSING",
            GateArmState::Closed => "CLOSED",
        }
    }

    /// Parse an operator-entered state name (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        let upper = s.trim().to_ascii_uppercase();
        Self::ALL.into_iter().find(|st| st.as_str() == upper)
    }
}

impl fmt::Display for GateArmState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derived permission restricting open/close of an arm or array.
///
/// Never set by operators; always the output of interlock reduction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GateArmInterlock {
    None,
    DenyOpen,
    DenyClose,
    DenyAll,
    /// The gate arm system is disabled: every movement is denied.
    SystemDisable,
}

impl GateArmInterlock {
    const ALL: [GateArmInterlock; 5] = [
        GateArmInterlock::None,
        GateArmInterlock::DenyOpen,
        GateArmInterlock::DenyClose,
        GateArmInterlock::DenyAll,
        GateArmInterlock::SystemDisable,
    ];

    pub fn ordinal(self) -> i32 {
        self as i32
    }

    /// Decode a persisted ordinal.
    ///
    /// # Errors
    ///
    /// Returns [`GateArmError::InvalidOrdinal`] for out-of-range values.
    pub fn from_ordinal(ordinal: i32) -> Result<Self, GateArmError> {
        usize::try_from(ordinal)
            .ok()
            .and_then(|i| Self::ALL.get(i).copied())
            .ok_or(GateArmError::InvalidOrdinal(ordinal))
    }

    pub fn is_open_allowed(self) -> bool {
        matches!(self, GateArmInterlock::None | GateArmInterlock::DenyClose)
    }

    pub fn is_close_allowed(self) -> bool {
        matches!(self, GateArmInterlock::None | GateArmInterlock::DenyOpen)
    }

    pub fn is_open_denied(self) -> bool {
        !self.is_open_allowed()
    }

    pub fn is_close_denied(self) -> bool {
        !self.is_close_allowed()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            GateArmInterlock::None => "NONE",
            GateArmInterlock::DenyOpen => "DENY_OPEN",
            GateArmInterlock::DenyClose => "DENY_CLOSE",
            GateArmInterlock::DenyAll => "DENY_ALL",
            GateArmInterlock::SystemDisable => "SYSTEM_DISABLE",
        }
    }
}

impl fmt::Display for GateArmInterlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maintenance requests that can be forwarded to a device controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeviceRequest {
    NoRequest,
    SendSettings,
    QueryConfiguration,
    QueryStatus,
    ResetDevice,
}

impl DeviceRequest {
    /// Requests a gate arm controller will accept.  Everything else is
    /// silently dropped.
    pub fn is_gate_arm_request(self) -> bool {
        matches!(
            self,
            DeviceRequest::SendSettings | DeviceRequest::QueryStatus | DeviceRequest::ResetDevice
        )
    }
}

/// Display style bits computed from device state, used by operator clients
/// to filter and colour devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ItemStyles(u32);

impl ItemStyles {
    pub const ALL: ItemStyles = ItemStyles(1 << 0);
    pub const NO_CONTROLLER: ItemStyles = ItemStyles(1 << 1);
    pub const CLOSED: ItemStyles = ItemStyles(1 << 2);
    pub const OPEN: ItemStyles = ItemStyles(1 << 3);
    pub const MOVING: ItemStyles = ItemStyles(1 << 4);
    pub const MAINTENANCE: ItemStyles = ItemStyles(1 << 5);
    pub const FAILED: ItemStyles = ItemStyles(1 << 6);
    pub const INACTIVE: ItemStyles = ItemStyles(1 << 7);

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn contains(self, other: ItemStyles) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: ItemStyles) {
        self.0 |= other.0;
    }
}

/// Roadway location of a device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeoLoc {
    pub roadway: Option<String>,
    /// Travel direction index; `0` means unknown.
    pub road_dir: u8,
}

impl GeoLoc {
    pub fn new(roadway: impl Into<String>, road_dir: u8) -> Self {
        Self {
            roadway: Some(roadway.into()),
            road_dir,
        }
    }

    /// Same road, both directions known, and the directions differ.
    pub fn opposes(&self, other: &GeoLoc) -> bool {
        match (&self.roadway, &other.roadway) {
            (Some(a), Some(b)) => {
                a == b && self.road_dir != 0 && other.road_dir != 0 && self.road_dir != other.road_dir
            }
            _ => false,
        }
    }
}

/// Kind of persisted gate arm entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    GateArm,
    GateArmArray,
}

impl EntityKind {
    /// Backing table name.
    pub fn table(self) -> &'static str {
        match self {
            EntityKind::GateArm => "iris.gate_arm",
            EntityKind::GateArmArray => "iris.gate_arm_array",
        }
    }
}

/// Identity of a persisted entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    pub kind: EntityKind,
    pub name: String,
}

impl EntityRef {
    pub fn gate_arm(name: impl Into<String>) -> Self {
        Self {
            kind: EntityKind::GateArm,
            name: name.into(),
        }
    }

    pub fn gate_arm_array(name: impl Into<String>) -> Self {
        Self {
            kind: EntityKind::GateArmArray,
            name: name.into(),
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind.table(), self.name)
    }
}

/// A single column value written through the persistence boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldValue {
    Text(Option<String>),
    Int(i64),
    Bool(bool),
}

impl From<GateArmState> for FieldValue {
    fn from(s: GateArmState) -> Self {
        FieldValue::Int(i64::from(s.ordinal()))
    }
}

impl From<GateArmInterlock> for FieldValue {
    fn from(i: GateArmInterlock) -> Self {
        FieldValue::Int(i64::from(i.ordinal()))
    }
}

impl From<Option<String>> for FieldValue {
    fn from(s: Option<String>) -> Self {
        FieldValue::Text(s)
    }
}

/// Trim a fault description and truncate it to [`MAX_FAULT_LEN`] characters.
/// Empty descriptions become `None`.
pub fn trim_fault(fault: Option<&str>) -> Option<String> {
    let f = fault?.trim();
    if f.is_empty() {
        return None;
    }
    Some(f.chars().take(MAX_FAULT_LEN).collect::<String>().trim_end().to_string())
}

/// Row of the gate arm event log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateArmEvent {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub entity: EntityRef,
    pub state: GateArmState,
    pub fault: Option<String>,
    /// User responsible for the change, `None` for automatic transitions.
    pub owner: Option<String>,
}

impl GateArmEvent {
    pub fn new(entity: EntityRef, state: GateArmState, fault: Option<String>, owner: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            entity,
            state,
            fault,
            owner,
        }
    }
}

/// Unified event wrapper for the notification bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// e.g., "iris-runtime::registry"
    pub source: String,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(source: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source: source.into(),
            payload,
        }
    }
}

/// Variants of data routed over the notification bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    /// An attribute of a persisted entity changed; observers should re-read it.
    AttributeChanged { entity: EntityRef, attribute: String },
    /// Operator alert (comm failure, fault, conflict, system disable).
    Alert { message: String },
}

/// Sink for operator alerts (email, pager, ...).  Fire-and-forget.
pub trait AlertSink: Send + Sync {
    fn send_alert(&self, message: &str);
}

/// Notifies connected observers that an attribute changed.  Fire-and-forget.
pub trait ChangePublisher: Send + Sync {
    fn publish(&self, entity: &EntityRef, attribute: &str);
}

/// Errors raised by the gate arm subsystem.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GateArmError {
    #[error("INVALID STATE CHANGE: {from} to {to}")]
    InvalidTransition { from: GateArmState, to: GateArmState },

    #[error("INTERLOCK CONFLICT: {name} ({interlock})")]
    InterlockConflict { name: String, interlock: GateArmInterlock },

    #[error("Origin rejected: {0}")]
    OriginRejected(String),

    #[error("Unknown device: {0}")]
    UnknownDevice(String),

    #[error("Invalid index: {0}")]
    InvalidIndex(usize),

    #[error("Already assigned: {array}[{idx}]")]
    AlreadyAssigned { array: String, idx: usize },

    #[error("Gate arm system disabled: {0}")]
    SystemDisabled(String),

    #[error("Gate arm configuration disabled")]
    ConfigDisabled,

    #[error("Persistence failure: {0}")]
    Persistence(String),

    #[error("Hardware Fault on {arm}: {details}")]
    Hardware { arm: String, details: String },

    #[error("Invalid ordinal: {0}")]
    InvalidOrdinal(i32),

    #[error("{0}")]
    Veto(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_ordinals_are_stable() {
        assert_eq!(GateArmState::Unknown.ordinal(), 0);
        assert_eq!(GateArmState::Closed.ordinal(), 6);
        for st in GateArmState::ALL {
            assert_eq!(GateArmState::from_ordinal(st.ordinal()), Ok(st));
        }
        assert_eq!(
            GateArmState::from_ordinal(7),
            Err(GateArmError::InvalidOrdinal(7))
        );
        assert!(GateArmState::from_ordinal(-1).is_err());
    }

    #[test]
    fn interlock_permissions() {
        use GateArmInterlock::*;
        assert!(None.is_open_allowed() && None.is_close_allowed());
        assert!(DenyOpen.is_open_denied() && DenyOpen.is_close_allowed());
        assert!(DenyClose.is_open_allowed() && DenyClose.is_close_denied());
        assert!(DenyAll.is_open_denied() && DenyAll.is_close_denied());
        assert!(SystemDisable.is_open_denied() && SystemDisable.is_close_denied());
    }

    #[test]
    fn possibly_open_and_closed() {
        assert!(GateArmState::Unknown.is_possibly_open());
        assert!(GateArmState::Unknown.is_possibly_closed());
        assert!(!GateArmState::Closed.is_possibly_open());
        assert!(!GateArmState::Open.is_possibly_closed());
        assert!(GateArmState::WarnClose.is_possibly_open());
    }

    #[test]
    fn parse_state_names() {
        assert_eq!(GateArmState::parse("warn_close"), Some(GateArmState::WarnClose));
        assert_eq!(GateArmState::parse(" Opening "), Some(GateArmState::Opening));
        assert_eq!(GateArmState::parse("ajar"), None);
    }

    #[test]
    fn geo_loc_opposing_requires_known_directions() {
        let nb = GeoLoc::new("I-35W", 1);
        let sb = GeoLoc::new("I-35W", 2);
        let unknown = GeoLoc::new("I-35W", 0);
        let other_road = GeoLoc::new("I-94", 2);
        assert!(nb.opposes(&sb));
        assert!(!nb.opposes(&nb));
        assert!(!nb.opposes(&unknown));
        assert!(!nb.opposes(&other_road));
        assert!(!GeoLoc::default().opposes(&nb));
    }

    #[test]
    fn fault_text_is_trimmed_and_truncated() {
        assert_eq!(trim_fault(None), None);
        assert_eq!(trim_fault(Some("   ")), None);
        assert_eq!(trim_fault(Some("  motor stall ")), Some("motor stall".to_string()));
        let long = "x".repeat(40);
        assert_eq!(trim_fault(Some(&long)).map(|f| f.len()), Some(MAX_FAULT_LEN));
    }

    #[test]
    fn item_styles_insert_and_contains() {
        let mut s = ItemStyles::ALL;
        s.insert(ItemStyles::OPEN);
        assert!(s.contains(ItemStyles::OPEN));
        assert!(!s.contains(ItemStyles::CLOSED));
    }

    #[test]
    fn device_request_filter() {
        assert!(DeviceRequest::QueryStatus.is_gate_arm_request());
        assert!(DeviceRequest::SendSettings.is_gate_arm_request());
        assert!(!DeviceRequest::QueryConfiguration.is_gate_arm_request());
    }

    #[test]
    fn event_roundtrip() {
        let event = Event::new(
            "iris-runtime::registry",
            EventPayload::AttributeChanged {
                entity: EntityRef::gate_arm("ga_1"),
                attribute: "armState".to_string(),
            },
        );
        let json = serde_json::to_string(&event).unwrap();
        let back: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(event.id, back.id);
        assert_eq!(event.source, back.source);
    }

    #[test]
    fn error_display() {
        let err = GateArmError::InvalidTransition {
            from: GateArmState::Closed,
            to: GateArmState::Closing,
        };
        assert_eq!(err.to_string(), "INVALID STATE CHANGE: CLOSED to CLOSING");

        let err = GateArmError::InterlockConflict {
            name: "ramp_a".to_string(),
            interlock: GateArmInterlock::DenyOpen,
        };
        assert!(err.to_string().contains("ramp_a"));
    }
}
