//! Merging of partial WebSoc trees.
//!
//! Every partial tree is flattened into single-path shells (one school, one
//! department, one course, one section), which are then folded into an
//! accumulator level by level. A node whose identity is already present is
//! never merged field-by-field: the first one seen wins and only its children
//! are considered for insertion.

use crate::types::*;
use tracing::debug;

/// Identity key of a node among its siblings.
pub trait Identity {
    type Key<'a>: PartialEq
    where
        Self: 'a;

    fn identity(&self) -> Self::Key<'_>;
}

impl Identity for RawSchool {
    type Key<'a> = &'a str;

    fn identity(&self) -> Self::Key<'_> {
        &self.name
    }
}

impl Identity for RawDepartment {
    type Key<'a> = &'a str;

    fn identity(&self) -> Self::Key<'_> {
        &self.code
    }
}

/// Same number with a different title is a different course (e.g. topics courses).
impl Identity for RawCourse {
    type Key<'a> = (&'a str, &'a str);

    fn identity(&self) -> Self::Key<'_> {
        (self.course_number.as_str(), self.title.as_str())
    }
}

impl Identity for RawSection {
    type Key<'a> = &'a str;

    fn identity(&self) -> Self::Key<'_> {
        &self.section_code
    }
}

/// Meetings are compared on their raw text, before normalization.
impl Identity for RawMeeting {
    type Key<'a> = (&'a str, &'a str);

    fn identity(&self) -> Self::Key<'_> {
        (self.days.as_str(), self.time.as_str())
    }
}

/// Result of [`insert_if_absent`].
pub enum Insertion<'a, T> {
    /// No sibling shared the identity; the node was appended.
    Inserted,
    /// A sibling already holds the identity. It is left untouched and the
    /// rejected node is handed back.
    Collided { existing: &'a mut T, incoming: T },
}

/// Appends `node` unless a sibling with the same identity exists.
pub fn insert_if_absent<T: Identity>(siblings: &mut Vec<T>, node: T) -> Insertion<'_, T> {
    match siblings.iter().position(|s| s.identity() == node.identity()) {
        Some(i) => Insertion::Collided {
            existing: &mut siblings[i],
            incoming: node,
        },
        None => {
            siblings.push(node);
            Insertion::Inserted
        }
    }
}

fn fold_level<T, F>(siblings: &mut Vec<T>, node: T, descend: F)
where
    T: Identity,
    F: FnOnce(&mut T, T),
{
    if let Insertion::Collided { existing, incoming } = insert_if_absent(siblings, node) {
        descend(existing, incoming);
    }
}

/// Drops meetings whose `(days, time)` repeats an earlier one.
pub fn dedup_meetings(meetings: Vec<RawMeeting>) -> Vec<RawMeeting> {
    let mut unique = Vec::with_capacity(meetings.len());
    for meeting in meetings {
        let _ = insert_if_absent(&mut unique, meeting);
    }
    unique
}

/// Splits a tree into single-path shells, one per section.
///
/// Schools, departments and courses without children still produce a
/// (shorter) path so that merging never loses an empty node.
pub fn flatten(tree: RawPartialTree) -> Vec<RawSchool> {
    let mut paths = Vec::new();

    for school in tree.schools {
        let school_shell = RawSchool {
            departments: Vec::new(),
            ..school
        };
        if school.departments.is_empty() {
            paths.push(school_shell);
            continue;
        }

        for dept in school.departments {
            let dept_shell = RawDepartment {
                courses: Vec::new(),
                ..dept
            };
            let wrap_dept = |dept: RawDepartment| RawSchool {
                departments: vec![dept],
                ..school_shell.clone()
            };
            if dept.courses.is_empty() {
                paths.push(wrap_dept(dept_shell));
                continue;
            }

            for course in dept.courses {
                let course_shell = RawCourse {
                    sections: Vec::new(),
                    ..course
                };
                let wrap_course = |course: RawCourse| {
                    wrap_dept(RawDepartment {
                        courses: vec![course],
                        ..dept_shell.clone()
                    })
                };
                if course.sections.is_empty() {
                    paths.push(wrap_course(course_shell));
                    continue;
                }

                for section in course.sections {
                    let section = RawSection {
                        meetings: dedup_meetings(section.meetings),
                        ..section
                    };
                    paths.push(wrap_course(RawCourse {
                        sections: vec![section],
                        ..course_shell.clone()
                    }));
                }
            }
        }
    }

    paths
}

/// Running union of partial trees. Used across retry rounds so that each
/// round's successes are folded in as soon as the round settles.
#[derive(Debug, Default)]
pub struct TreeAccumulator {
    schools: Vec<RawSchool>,
}

impl TreeAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one partial tree into the accumulator.
    pub fn absorb(&mut self, tree: RawPartialTree) {
        for path in flatten(tree) {
            self.fold_path(path);
        }
    }

    fn fold_path(&mut self, school: RawSchool) {
        fold_level(&mut self.schools, school, |school, incoming| {
            for dept in incoming.departments {
                fold_level(&mut school.departments, dept, |dept, incoming| {
                    for course in incoming.courses {
                        fold_level(&mut dept.courses, course, |course, incoming| {
                            for section in incoming.sections {
                                fold_level(&mut course.sections, section, |kept, dup| {
                                    debug!(
                                        section_code = %kept.section_code,
                                        dropped_status = %dup.status,
                                        "Discarding duplicate section"
                                    );
                                });
                            }
                        });
                    }
                });
            }
        });
    }

    pub fn finish(self) -> RawPartialTree {
        RawPartialTree {
            schools: self.schools,
        }
    }
}

/// Merges any number of partial trees into one. Earlier trees win identity
/// collisions.
pub fn merge<I>(trees: I) -> RawPartialTree
where
    I: IntoIterator<Item = RawPartialTree>,
{
    let mut acc = TreeAccumulator::new();
    for tree in trees {
        acc.absorb(tree);
    }
    acc.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(code: &str, status: &str) -> RawSection {
        RawSection {
            section_code: code.to_string(),
            status: status.to_string(),
            ..Default::default()
        }
    }

    fn course(number: &str, title: &str, sections: Vec<RawSection>) -> RawCourse {
        RawCourse {
            dept_code: "COMPSCI".to_string(),
            course_number: number.to_string(),
            title: title.to_string(),
            sections,
            ..Default::default()
        }
    }

    fn tree(school: &str, dept: &str, courses: Vec<RawCourse>) -> RawPartialTree {
        RawPartialTree {
            schools: vec![RawSchool {
                name: school.to_string(),
                departments: vec![RawDepartment {
                    name: dept.to_string(),
                    code: dept.to_string(),
                    courses,
                    ..Default::default()
                }],
                ..Default::default()
            }],
        }
    }

    #[test]
    fn test_empty_input() {
        assert!(merge(Vec::new()).schools.is_empty());
    }

    #[test]
    fn test_single_tree_is_unchanged() {
        let t = tree(
            "ICS",
            "COMPSCI",
            vec![
                course("161", "DES&ANALYS OF ALGOR", vec![section("34250", "OPEN")]),
                course("171", "INTRO ARTIF INTEL", vec![]),
            ],
        );
        assert_eq!(merge(vec![t.clone()]), t);
    }

    #[test]
    fn test_first_seen_section_wins() {
        let a = tree("ICS", "COMPSCI", vec![course("161", "ALGOR", vec![section("34250", "OPEN")])]);
        let b = tree(
            "ICS",
            "COMPSCI",
            vec![course(
                "161",
                "ALGOR",
                vec![section("34250", "FULL"), section("34260", "OPEN")],
            )],
        );

        let merged = merge(vec![a, b]);
        let sections = &merged.schools[0].departments[0].courses[0].sections;
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].status, "OPEN");
        assert_eq!(sections[1].section_code, "34260");
    }

    #[test]
    fn test_same_number_different_title_stays_separate() {
        let a = tree("ICS", "COMPSCI", vec![course("199", "INDIVIDUAL STUDY", vec![])]);
        let b = tree("ICS", "COMPSCI", vec![course("199", "SPECIAL TOPICS", vec![])]);
        let merged = merge(vec![a, b]);
        assert_eq!(merged.schools[0].departments[0].courses.len(), 2);
    }

    #[test]
    fn test_departments_join_under_one_school() {
        let a = tree("ICS", "COMPSCI", vec![course("161", "ALGOR", vec![section("1", "OPEN")])]);
        let b = tree("ICS", "I&C SCI", vec![course("31", "INTRO PROGRAMMING", vec![section("2", "OPEN")])]);
        let merged = merge(vec![a, b]);
        assert_eq!(merged.schools.len(), 1);
        assert_eq!(merged.schools[0].departments.len(), 2);
    }

    #[test]
    fn test_meeting_dedup() {
        let meeting = RawMeeting {
            days: "MWF".to_string(),
            time: "9:00-9:50".to_string(),
            bldg: vec!["SSL 228".to_string()],
        };
        let other = RawMeeting {
            time: "10:00-10:50".to_string(),
            ..meeting.clone()
        };
        let unique = dedup_meetings(vec![meeting.clone(), other.clone(), meeting.clone()]);
        assert_eq!(unique, vec![meeting, other]);
    }

    #[test]
    fn test_flatten_one_path_per_section() {
        let t = tree(
            "ICS",
            "COMPSCI",
            vec![
                course("161", "ALGOR", vec![section("1", "OPEN"), section("2", "OPEN")]),
                course("171", "AI", vec![]),
            ],
        );
        let paths = flatten(t);
        assert_eq!(paths.len(), 3);
        assert!(paths[2].departments[0].courses[0].sections.is_empty());
    }
}
