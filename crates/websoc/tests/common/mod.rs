//! Common test utilities

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use websoc::error::FetchError;
use websoc::types::*;
use websoc::SubQueryFetcher;

pub const TERM: &str = "2024 Fall";

/// Build a one-school tree holding a single course with the given sections
#[allow(dead_code)]
pub fn dept_tree(school: &str, dept: &str, course_number: &str, sections: &[(&str, &str)]) -> RawPartialTree {
    RawPartialTree {
        schools: vec![RawSchool {
            name: school.to_string(),
            departments: vec![RawDepartment {
                name: dept.to_string(),
                code: dept.to_string(),
                courses: vec![RawCourse {
                    dept_code: dept.to_string(),
                    course_number: course_number.to_string(),
                    title: format!("{dept} {course_number}"),
                    sections: sections
                        .iter()
                        .map(|(code, status)| RawSection {
                            section_code: code.to_string(),
                            status: status.to_string(),
                            units: "4".to_string(),
                            meetings: vec![RawMeeting {
                                days: "MWF".to_string(),
                                time: "10:00-10:50".to_string(),
                                bldg: vec!["SSL 228".to_string()],
                            }],
                            final_exam: "Mon Dec 11 10:30-12:30pm @ ICS 174".to_string(),
                            ..Default::default()
                        })
                        .collect(),
                    ..Default::default()
                }],
                ..Default::default()
            }],
            ..Default::default()
        }],
    }
}

/// A fetcher answering department sub-queries from a fixed script
#[allow(dead_code)]
#[derive(Default)]
pub struct ScriptedFetcher {
    trees: HashMap<String, RawPartialTree>,
    /// Remaining failures before a department starts succeeding
    failures: Mutex<HashMap<String, u32>>,
    delays: HashMap<String, Duration>,
    calls: Mutex<Vec<String>>,
}

#[allow(dead_code)]
impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answer(mut self, dept: &str, tree: RawPartialTree) -> Self {
        self.trees.insert(dept.to_string(), tree);
        self
    }

    pub fn fail_times(self, dept: &str, times: u32) -> Self {
        self.failures.lock().unwrap().insert(dept.to_string(), times);
        self
    }

    pub fn delay(mut self, dept: &str, delay: Duration) -> Self {
        self.delays.insert(dept.to_string(), delay);
        self
    }

    pub fn calls_for(&self, dept: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|d| *d == dept).count()
    }
}

#[async_trait]
impl SubQueryFetcher for ScriptedFetcher {
    async fn fetch(&self, query: &SubQuery) -> Result<RawPartialTree, FetchError> {
        let dept = query.department.clone().unwrap_or_default();
        self.calls.lock().unwrap().push(dept.clone());

        if let Some(delay) = self.delays.get(&dept) {
            tokio::time::sleep(*delay).await;
        }

        let should_fail = {
            let mut failures = self.failures.lock().unwrap();
            match failures.get_mut(&dept) {
                Some(remaining) if *remaining > 0 => {
                    *remaining -= 1;
                    true
                }
                _ => false,
            }
        };
        if should_fail {
            return Err(FetchError::Network {
                message: format!("connection reset for {dept}"),
            });
        }

        Ok(self.trees.get(&dept).cloned().unwrap_or_default())
    }
}
