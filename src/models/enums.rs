use serde::{Deserialize, Serialize};

use super::ModelError;

/// Macro to generate an enum with the backend's display label
/// (`as_str` + `std::str::FromStr`). Numeric state codes are mapped by hand
/// below because not every state has one.
macro_rules! label_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = ModelError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim() {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(ModelError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

label_enum!(VisitStatus {
    Assigned => "Asignada",
    Confirmed => "Confirmada",
    InProgress => "En Proceso",
    Finished => "Finalizada",
});

label_enum!(CaseStatus {
    Created => "Creado",
    InProcess => "En Proceso",
    Finished => "Finalizado",
    Closed => "Cerrado",
});

impl VisitStatus {
    /// Map the backend's stored state code. The backend only stores three
    /// codes; `InProgress` is never produced from a number.
    pub fn from_code(code: i64) -> Result<Self, ModelError> {
        match code {
            1 => Ok(Self::Assigned),
            2 => Ok(Self::Confirmed),
            3 => Ok(Self::Finished),
            other => Err(ModelError::InvalidEnum {
                field: "VisitStatus".into(),
                value: other.to_string(),
            }),
        }
    }

    pub fn code(self) -> Option<i64> {
        match self {
            Self::Assigned => Some(1),
            Self::Confirmed => Some(2),
            Self::InProgress => None,
            Self::Finished => Some(3),
        }
    }

    /// Forward-only ordering used to reject regressions.
    pub fn rank(self) -> u8 {
        match self {
            Self::Assigned => 0,
            Self::Confirmed => 1,
            Self::InProgress => 2,
            Self::Finished => 3,
        }
    }

    pub fn is_terminal(self) -> bool {
        self == Self::Finished
    }
}

impl CaseStatus {
    pub fn from_code(code: i64) -> Result<Self, ModelError> {
        match code {
            1 => Ok(Self::Created),
            2 => Ok(Self::InProcess),
            3 => Ok(Self::Finished),
            4 => Ok(Self::Closed),
            other => Err(ModelError::InvalidEnum {
                field: "CaseStatus".into(),
                value: other.to_string(),
            }),
        }
    }

    pub fn code(self) -> i64 {
        match self {
            Self::Created => 1,
            Self::InProcess => 2,
            Self::Finished => 3,
            Self::Closed => 4,
        }
    }
}
