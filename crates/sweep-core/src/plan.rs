use crate::aggregate::ProgramGroups;
use crate::model::{ClassifiedRecord, Importance};
use std::collections::{BTreeMap, BTreeSet};

/// The operator's already-resolved answers for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionChoices {
    /// Programs whose records are never relocated.
    pub keep: BTreeSet<String>,
    /// Per non-kept program, the tiers to relocate. Missing means none.
    pub delete_tiers: BTreeMap<String, BTreeSet<Importance>>,
}

impl SelectionChoices {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn keep_program(mut self, program: impl Into<String>) -> Self {
        self.keep.insert(program.into());
        self
    }

    pub fn delete_tiers(
        mut self,
        program: impl Into<String>,
        tiers: impl IntoIterator<Item = Importance>,
    ) -> Self {
        self.delete_tiers
            .insert(program.into(), tiers.into_iter().collect());
        self
    }
}

/// Records the operator approved for relocation, in display order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectionSet {
    records: Vec<ClassifiedRecord>,
}

impl SelectionSet {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClassifiedRecord> {
        self.records.iter()
    }

    pub fn total_size_mb(&self) -> f64 {
        self.records.iter().map(|r| r.record.size_mb()).sum()
    }

    pub fn into_records(self) -> Vec<ClassifiedRecord> {
        self.records
    }
}

/// Flatten the groups into the set of records to relocate.
///
/// Kept programs contribute nothing; every other program contributes only
/// the records whose tier the operator chose to delete.
pub fn plan_selection(groups: &ProgramGroups, choices: &SelectionChoices) -> SelectionSet {
    let records = groups
        .non_empty()
        .filter(|group| !choices.keep.contains(&group.program))
        .filter_map(|group| {
            choices
                .delete_tiers
                .get(&group.program)
                .map(|tiers| (group, tiers))
        })
        .flat_map(|(group, tiers)| {
            group
                .records
                .iter()
                .filter(move |r| tiers.contains(&r.importance()))
                .cloned()
        })
        .collect();

    SelectionSet { records }
}

/// Parse an answer to "which programs to keep?".
///
/// `none` keeps nothing, `all` keeps everything, otherwise a comma list of
/// program names (case-insensitive, unknown names ignored). Returns `None`
/// when nothing valid was named so the caller can ask again.
pub fn parse_program_choice(input: &str, available: &[&str]) -> Option<Vec<String>> {
    let answer = input.trim().to_lowercase();
    match answer.as_str() {
        "none" => return Some(Vec::new()),
        "all" => return Some(available.iter().map(|p| p.to_string()).collect()),
        _ => {}
    }

    let named: BTreeSet<String> = answer
        .split(',')
        .map(|part| part.trim().to_string())
        .filter(|part| !part.is_empty())
        .collect();

    let chosen: Vec<String> = available
        .iter()
        .filter(|program| named.contains(&program.to_lowercase()))
        .map(|program| program.to_string())
        .collect();

    if chosen.is_empty() {
        None
    } else {
        Some(chosen)
    }
}

/// Parse an answer to "which importance levels to delete?".
///
/// `none`, `all`, or a comma list of `low`/`medium`/`high` in any case.
pub fn parse_tier_choice(input: &str) -> Option<BTreeSet<Importance>> {
    let answer = input.trim().to_lowercase();
    match answer.as_str() {
        "none" => return Some(BTreeSet::new()),
        "all" => return Some(Importance::ALL.into_iter().collect()),
        _ => {}
    }

    let tiers: BTreeSet<Importance> = answer
        .split(',')
        .filter_map(|part| match part.trim() {
            "low" => Some(Importance::Low),
            "medium" => Some(Importance::Medium),
            "high" => Some(Importance::High),
            _ => None,
        })
        .collect();

    if tiers.is_empty() {
        None
    } else {
        Some(tiers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{Aggregator, ClassificationSink, OTHERS};
    use crate::model::{Classification, FileRecord};
    use chrono::Local;
    use std::path::PathBuf;

    fn groups() -> ProgramGroups {
        let aggregator = Aggregator::new(vec![
            "Android Studio".to_string(),
            "Transporter".to_string(),
        ]);
        let entries = [
            ("/c/Android Studio/a", Importance::Low),
            ("/c/Android Studio/b", Importance::Medium),
            ("/c/Android Studio/c", Importance::High),
            ("/c/Transporter/d", Importance::Low),
            ("/c/misc/e", Importance::Medium),
        ];
        for (path, importance) in entries {
            aggregator.accept(
                FileRecord {
                    path: PathBuf::from(path),
                    size_bytes: 1024,
                    modified: Local::now(),
                    is_dir: false,
                },
                Classification {
                    important: false,
                    importance,
                    reason: String::new(),
                },
            );
        }
        aggregator.finish()
    }

    fn paths(selection: &SelectionSet) -> Vec<PathBuf> {
        selection.iter().map(|r| r.record.path.clone()).collect()
    }

    #[test]
    fn test_empty_inputs_yield_empty_selection() {
        let empty = ProgramGroups::new(&[]);
        assert!(plan_selection(&empty, &SelectionChoices::new()).is_empty());
        assert!(plan_selection(&groups(), &SelectionChoices::new()).is_empty());
    }

    #[test]
    fn test_keep_all_programs_yields_empty() {
        let groups = groups();
        let mut choices = SelectionChoices::new();
        for program in groups.programs() {
            choices = choices
                .keep_program(program)
                .delete_tiers(program, Importance::ALL);
        }
        assert!(plan_selection(&groups, &choices).is_empty());
    }

    #[test]
    fn test_delete_all_tiers_includes_whole_program() {
        let groups = groups();
        let choices = SelectionChoices::new().delete_tiers("Android Studio", Importance::ALL);
        let selection = plan_selection(&groups, &choices);
        assert_eq!(
            paths(&selection),
            vec![
                PathBuf::from("/c/Android Studio/a"),
                PathBuf::from("/c/Android Studio/b"),
                PathBuf::from("/c/Android Studio/c"),
            ]
        );
    }

    #[test]
    fn test_tier_filter_per_program() {
        let groups = groups();
        let choices = SelectionChoices::new()
            .keep_program("Transporter")
            .delete_tiers("Transporter", Importance::ALL)
            .delete_tiers("Android Studio", [Importance::Low])
            .delete_tiers(OTHERS, [Importance::Low, Importance::High]);
        let selection = plan_selection(&groups, &choices);
        assert_eq!(paths(&selection), vec![PathBuf::from("/c/Android Studio/a")]);
    }

    #[test]
    fn test_plan_is_deterministic() {
        let groups = groups();
        let choices = SelectionChoices::new()
            .delete_tiers("Android Studio", [Importance::Low, Importance::Medium])
            .delete_tiers(OTHERS, [Importance::Medium]);
        let first = plan_selection(&groups, &choices);
        let second = plan_selection(&groups, &choices);
        assert_eq!(first, second);
        assert_eq!(first.len(), 3);
    }

    #[test]
    fn test_parse_program_choice() {
        let available = ["Android Studio", "Others"];
        assert_eq!(parse_program_choice("none", &available), Some(vec![]));
        assert_eq!(
            parse_program_choice(" ALL ", &available),
            Some(vec!["Android Studio".to_string(), "Others".to_string()])
        );
        assert_eq!(
            parse_program_choice("others, android studio, Build", &available),
            Some(vec!["Android Studio".to_string(), "Others".to_string()])
        );
        assert_eq!(parse_program_choice("Build", &available), None);
        assert_eq!(parse_program_choice("", &available), None);
    }

    #[test]
    fn test_parse_tier_choice() {
        assert_eq!(parse_tier_choice("none"), Some(BTreeSet::new()));
        assert_eq!(parse_tier_choice("all").unwrap().len(), 3);
        assert_eq!(
            parse_tier_choice("Low, MEDIUM, bogus"),
            Some([Importance::Low, Importance::Medium].into_iter().collect())
        );
        assert_eq!(parse_tier_choice("critical"), None);
    }
}
