//! Persisted column sets.
//!
//! # `iris.gate_arm`
//!
//! | column     | type    | description                                   |
//! |------------|---------|-----------------------------------------------|
//! | name       | TEXT    | primary key                                   |
//! | ga_array   | TEXT    | containing array (NULL when unassigned)       |
//! | idx        | INTEGER | 1-based slot in the array                     |
//! | roadway    | TEXT    | road of the arm location                      |
//! | road_dir   | INTEGER | travel direction, 0 = unknown                 |
//! | controller | TEXT    | controller binding                            |
//! | pin        | INTEGER | controller I/O pin                            |
//! | notes      | TEXT    | free text, may carry hashtags                 |
//! | opposing   | INTEGER | 1 when the arm guards an opposing-flow ramp   |
//! | downstream | TEXT    | hashtag naming arms downstream of this one    |
//! | camera     | TEXT    | verification camera                           |
//! | approach   | TEXT    | approach camera                               |
//! | arm_state  | INTEGER | `GateArmState` ordinal                        |
//! | interlock  | INTEGER | `GateArmInterlock` ordinal                    |
//! | fault      | TEXT    | fault description, at most 32 characters      |
//! | version    | TEXT    | controller software version                   |
//!
//! # `iris.gate_arm_array`
//!
//! Same location/notes/opposing/camera/approach/arm_state/interlock columns,
//! plus `prereq` (name of the array that must be open first) and
//! `action_plan` (plan whose phase follows this array).

use iris_types::{EntityKind, EntityRef, FieldValue, GateArmInterlock, GateArmState, GeoLoc};
use serde::{Deserialize, Serialize};

pub const GATE_ARM_COLUMNS: &[&str] = &[
    "name",
    "ga_array",
    "idx",
    "roadway",
    "road_dir",
    "controller",
    "pin",
    "notes",
    "opposing",
    "downstream",
    "camera",
    "approach",
    "arm_state",
    "interlock",
    "fault",
    "version",
];

pub const GATE_ARM_ARRAY_COLUMNS: &[&str] = &[
    "name",
    "roadway",
    "road_dir",
    "notes",
    "opposing",
    "prereq",
    "camera",
    "approach",
    "action_plan",
    "arm_state",
    "interlock",
];

/// Column whitelist for one table.
pub fn columns(kind: EntityKind) -> &'static [&'static str] {
    match kind {
        EntityKind::GateArm => GATE_ARM_COLUMNS,
        EntityKind::GateArmArray => GATE_ARM_ARRAY_COLUMNS,
    }
}

/// Persisted attributes of one gate arm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateArmRecord {
    pub name: String,
    pub ga_array: Option<String>,
    /// 1-based slot in `ga_array`.
    pub idx: usize,
    pub geo_loc: GeoLoc,
    pub controller: Option<String>,
    pub pin: u32,
    pub notes: Option<String>,
    pub opposing: bool,
    pub downstream: Option<String>,
    pub camera: Option<String>,
    pub approach: Option<String>,
    pub arm_state: GateArmState,
    pub interlock: GateArmInterlock,
    pub fault: Option<String>,
    pub version: Option<String>,
}

impl GateArmRecord {
    /// A fresh, unassigned arm in the fail-safe initial state.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ga_array: None,
            idx: 0,
            geo_loc: GeoLoc::default(),
            controller: None,
            pin: 0,
            notes: None,
            opposing: false,
            downstream: None,
            camera: None,
            approach: None,
            arm_state: GateArmState::Unknown,
            interlock: GateArmInterlock::SystemDisable,
            fault: None,
            version: None,
        }
    }

    fn fields(&self) -> Vec<(&'static str, FieldValue)> {
        vec![
            ("name", FieldValue::Text(Some(self.name.clone()))),
            ("ga_array", FieldValue::Text(self.ga_array.clone())),
            ("idx", int(self.idx)),
            ("roadway", FieldValue::Text(self.geo_loc.roadway.clone())),
            ("road_dir", FieldValue::Int(i64::from(self.geo_loc.road_dir))),
            ("controller", FieldValue::Text(self.controller.clone())),
            ("pin", FieldValue::Int(i64::from(self.pin))),
            ("notes", FieldValue::Text(self.notes.clone())),
            ("opposing", FieldValue::Bool(self.opposing)),
            ("downstream", FieldValue::Text(self.downstream.clone())),
            ("camera", FieldValue::Text(self.camera.clone())),
            ("approach", FieldValue::Text(self.approach.clone())),
            ("arm_state", self.arm_state.into()),
            ("interlock", self.interlock.into()),
            ("fault", FieldValue::Text(self.fault.clone())),
            ("version", FieldValue::Text(self.version.clone())),
        ]
    }
}

/// Persisted attributes of one gate arm array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateArmArrayRecord {
    pub name: String,
    pub geo_loc: GeoLoc,
    pub notes: Option<String>,
    pub opposing: bool,
    pub prereq: Option<String>,
    pub camera: Option<String>,
    pub approach: Option<String>,
    pub action_plan: Option<String>,
    pub arm_state: GateArmState,
    pub interlock: GateArmInterlock,
}

impl GateArmArrayRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            geo_loc: GeoLoc::default(),
            notes: None,
            opposing: false,
            prereq: None,
            camera: None,
            approach: None,
            action_plan: None,
            arm_state: GateArmState::Unknown,
            interlock: GateArmInterlock::SystemDisable,
        }
    }

    fn fields(&self) -> Vec<(&'static str, FieldValue)> {
        vec![
            ("name", FieldValue::Text(Some(self.name.clone()))),
            ("roadway", FieldValue::Text(self.geo_loc.roadway.clone())),
            ("road_dir", FieldValue::Int(i64::from(self.geo_loc.road_dir))),
            ("notes", FieldValue::Text(self.notes.clone())),
            ("opposing", FieldValue::Bool(self.opposing)),
            ("prereq", FieldValue::Text(self.prereq.clone())),
            ("camera", FieldValue::Text(self.camera.clone())),
            ("approach", FieldValue::Text(self.approach.clone())),
            ("action_plan", FieldValue::Text(self.action_plan.clone())),
            ("arm_state", self.arm_state.into()),
            ("interlock", self.interlock.into()),
        ]
    }
}

fn int(v: usize) -> FieldValue {
    FieldValue::Int(i64::try_from(v).unwrap_or(i64::MAX))
}

/// A record of either kind, as passed to [`Store::insert`][crate::Store::insert].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Record {
    GateArm(GateArmRecord),
    GateArmArray(GateArmArrayRecord),
}

impl Record {
    pub fn entity(&self) -> EntityRef {
        match self {
            Record::GateArm(r) => EntityRef::gate_arm(r.name.clone()),
            Record::GateArmArray(r) => EntityRef::gate_arm_array(r.name.clone()),
        }
    }

    /// Every column with its value, in whitelist order.
    pub fn fields(&self) -> Vec<(&'static str, FieldValue)> {
        match self {
            Record::GateArm(r) => r.fields(),
            Record::GateArmArray(r) => r.fields(),
        }
    }
}

impl From<GateArmRecord> for Record {
    fn from(r: GateArmRecord) -> Self {
        Record::GateArm(r)
    }
}

impl From<GateArmArrayRecord> for Record {
    fn from(r: GateArmArrayRecord) -> Self {
        Record::GateArmArray(r)
    }
}
