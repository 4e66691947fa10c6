//! Wizard stage ordering.
//!
//! The wizard is a linear flow with a bounded set of permitted jumps; the
//! dispatcher consults [`WizardStage::can_jump_to`] before honoring a
//! navigation request.

use serde::{Deserialize, Serialize};

/// One node of the wizard finite state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WizardStage {
    LanguageSelection,
    BulkTranslation,
    Contact,
    Education,
    JobPosting,
    WorkExperience,
    FurtherExperience,
    Skills,
    ReviewFinal,
    CoverLetter,
}

impl WizardStage {
    /// The full wizard order.
    pub const ORDER: [WizardStage; 10] = [
        WizardStage::LanguageSelection,
        WizardStage::BulkTranslation,
        WizardStage::Contact,
        WizardStage::Education,
        WizardStage::JobPosting,
        WizardStage::WorkExperience,
        WizardStage::FurtherExperience,
        WizardStage::Skills,
        WizardStage::ReviewFinal,
        WizardStage::CoverLetter,
    ];

    pub fn index(&self) -> usize {
        Self::ORDER.iter().position(|s| s == self).unwrap_or(0)
    }

    pub fn next(&self) -> Option<WizardStage> {
        Self::ORDER.get(self.index() + 1).copied()
    }

    pub fn prev(&self) -> Option<WizardStage> {
        self.index().checked_sub(1).map(|i| Self::ORDER[i])
    }

    /// Whether a direct jump from `self` to `target` is permitted.
    ///
    /// Adjacent moves are always allowed; going backward to any visited stage
    /// is allowed (back-navigation restores snapshots rather than losing
    /// data); a small set of declared forward jumps covers flows where a user
    /// legitimately skips a stage (e.g. no further experience to add).
    pub fn can_jump_to(&self, target: WizardStage) -> bool {
        if target == *self {
            return true;
        }
        let from = self.index();
        let to = target.index();
        if to < from {
            return true;
        }
        if to == from + 1 {
            return true;
        }
        matches!(
            (self, target),
            // Skippable stages: translation when the languages already
            // match, work→skills and further→review when a section is empty.
            (WizardStage::LanguageSelection, WizardStage::Contact)
                | (WizardStage::WorkExperience, WizardStage::Skills)
                | (WizardStage::FurtherExperience, WizardStage::ReviewFinal)
                | (WizardStage::ReviewFinal, WizardStage::CoverLetter)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WizardStage::LanguageSelection => "language-selection",
            WizardStage::BulkTranslation => "bulk-translation",
            WizardStage::Contact => "contact",
            WizardStage::Education => "education",
            WizardStage::JobPosting => "job-posting",
            WizardStage::WorkExperience => "work-experience",
            WizardStage::FurtherExperience => "further-experience",
            WizardStage::Skills => "skills",
            WizardStage::ReviewFinal => "review-final",
            WizardStage::CoverLetter => "cover-letter",
        }
    }
}

impl std::fmt::Display for WizardStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_is_linear() {
        assert_eq!(WizardStage::LanguageSelection.index(), 0);
        assert_eq!(
            WizardStage::LanguageSelection.next(),
            Some(WizardStage::BulkTranslation)
        );
        assert_eq!(WizardStage::CoverLetter.next(), None);
    }

    #[test]
    fn backward_jumps_always_allowed() {
        assert!(WizardStage::Skills.can_jump_to(WizardStage::Contact));
        assert!(WizardStage::CoverLetter.can_jump_to(WizardStage::LanguageSelection));
    }

    #[test]
    fn undeclared_forward_jump_rejected() {
        assert!(!WizardStage::Contact.can_jump_to(WizardStage::Skills));
        assert!(WizardStage::WorkExperience.can_jump_to(WizardStage::Skills));
    }

    #[test]
    fn serde_uses_kebab_case() {
        let json = serde_json::to_string(&WizardStage::JobPosting).unwrap();
        assert_eq!(json, "\"job-posting\"");
    }
}
