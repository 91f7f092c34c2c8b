use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

str_enum!(ReviewKind {
    TreatmentPlanReview => "treatment_plan_review",
    MultidisciplinaryReview => "multidisciplinary_review",
});

str_enum!(AttendanceStatus {
    Present => "present",
    Absent => "absent",
    Discharged => "discharged",
});

str_enum!(ProgressLevel {
    NoProgress => "no_progress",
    MinimalProgress => "minimal_progress",
    ModerateProgress => "moderate_progress",
    SignificantProgress => "significant_progress",
    Achieved => "achieved",
    Regression => "regression",
});

str_enum!(WeekStatus {
    Draft => "draft",
    Locked => "locked",
});

str_enum!(NoteStatus {
    Draft => "draft",
    Generated => "generated",
});

str_enum!(ProgramType {
    PartialHospitalization => "partial_hospitalization",
    IntensiveOutpatient => "intensive_outpatient",
    DayTreatment => "day_treatment",
});

impl ReviewKind {
    pub const ALL: [ReviewKind; 2] = [
        ReviewKind::TreatmentPlanReview,
        ReviewKind::MultidisciplinaryReview,
    ];

    /// Title used on generated documents.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::TreatmentPlanReview => "Treatment Plan Review",
            Self::MultidisciplinaryReview => "Multidisciplinary Team Review",
        }
    }
}

impl ProgramType {
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::PartialHospitalization => "Partial Hospitalization Program",
            Self::IntensiveOutpatient => "Intensive Outpatient Program",
            Self::DayTreatment => "Day Treatment Program",
        }
    }
}

impl ProgressLevel {
    /// Label printed in progress tables.
    pub fn label(&self) -> &'static str {
        match self {
            Self::NoProgress => "No Progress",
            Self::MinimalProgress => "Minimal Progress",
            Self::ModerateProgress => "Moderate Progress",
            Self::SignificantProgress => "Significant Progress",
            Self::Achieved => "Achieved",
            Self::Regression => "Regression",
        }
    }
}

impl std::fmt::Display for ProgressLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
