use std::{fmt, str::FromStr};

use super::error::DomainError;

/// The fixed portfolio sections reachable under `/section/{id}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
    Me,
    Cv,
    Scribblings,
    Mystery,
}

impl Section {
    pub const ALL: [Section; 4] = [
        Section::Me,
        Section::Cv,
        Section::Scribblings,
        Section::Mystery,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Section::Me => "me",
            Section::Cv => "cv",
            Section::Scribblings => "scribblings",
            Section::Mystery => "mystery",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Section::Me => "Me",
            Section::Cv => "CV",
            Section::Scribblings => "Scribblings",
            Section::Mystery => "Mystery",
        }
    }

    pub fn path(&self) -> String {
        format!("/section/{}", self.as_str())
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Section {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "me" => Ok(Section::Me),
            "cv" => Ok(Section::Cv),
            "scribblings" => Ok(Section::Scribblings),
            "mystery" => Ok(Section::Mystery),
            _ => Err(DomainError::not_found("section")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_section_round_trips_through_its_id() {
        for section in Section::ALL {
            assert_eq!(section.as_str().parse::<Section>(), Ok(section));
        }
    }

    #[test]
    fn unknown_and_differently_cased_ids_are_not_found() {
        assert_eq!(
            "blog".parse::<Section>(),
            Err(DomainError::not_found("section"))
        );
        assert!("ME".parse::<Section>().is_err());
    }
}
