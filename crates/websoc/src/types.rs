/// Types for WebSoc sub-queries and the School → Department → Course → Section tree
use serde::{Deserialize, Serialize};
use std::fmt;

/// One narrowed query that WebSoc can answer within its result-size limits.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubQuery {
    pub term: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ge_category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_codes: Option<String>,
}

impl SubQuery {
    /// Creates a sub-query scoped to a single department.
    pub fn department(term: &str, department: &str) -> Self {
        Self {
            term: term.to_string(),
            department: Some(department.to_string()),
            ..Default::default()
        }
    }

    /// Creates a sub-query scoped to a single GE category.
    pub fn ge_category(term: &str, ge: &str) -> Self {
        Self {
            term: term.to_string(),
            ge_category: Some(ge.to_string()),
            ..Default::default()
        }
    }

    /// Returns true if at least one narrowing filter is set.
    pub fn has_filter(&self) -> bool {
        [
            &self.department,
            &self.ge_category,
            &self.course_number,
            &self.section_codes,
        ]
        .iter()
        .any(|f| f.as_deref().is_some_and(|s| !s.trim().is_empty()))
    }
}

impl fmt::Display for SubQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.term)?;
        if let Some(dept) = &self.department {
            write!(f, " dept={dept}")?;
        }
        if let Some(ge) = &self.ge_category {
            write!(f, " ge={ge}")?;
        }
        if let Some(num) = &self.course_number {
            write!(f, " course={num}")?;
        }
        if let Some(codes) = &self.section_codes {
            write!(f, " sections={codes}")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Raw tree, as decoded from one sub-query's response
// ---------------------------------------------------------------------------

/// The result of one sub-query before merging.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPartialTree {
    #[serde(default)]
    pub schools: Vec<RawSchool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSchool {
    pub name: String,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub departments: Vec<RawDepartment>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDepartment {
    pub name: String,
    pub code: String,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub course_number_range_comments: Vec<String>,
    #[serde(default)]
    pub section_code_range_comments: Vec<String>,
    #[serde(default)]
    pub courses: Vec<RawCourse>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCourse {
    pub dept_code: String,
    pub course_number: String,
    pub title: String,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub prerequisite_link: String,
    #[serde(default)]
    pub sections: Vec<RawSection>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSection {
    pub section_code: String,
    #[serde(default)]
    pub section_type: String,
    #[serde(default)]
    pub section_num: String,
    #[serde(default)]
    pub units: String,
    #[serde(default)]
    pub instructors: Vec<String>,
    #[serde(default)]
    pub meetings: Vec<RawMeeting>,
    /// Free-form final exam text, e.g. `"Mon Dec 11 10:30-12:30pm @ ICS 174"`
    #[serde(default)]
    pub final_exam: String,
    #[serde(default)]
    pub enrollment: Enrollment,
    #[serde(default)]
    pub restrictions: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub comment: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMeeting {
    /// Day tokens such as `"MWF"` or `"TuTh"`
    #[serde(default)]
    pub days: String,
    /// Time range such as `"10:00-10:50"` or `"TBA"`
    #[serde(default)]
    pub time: String,
    #[serde(default)]
    pub bldg: Vec<String>,
}

/// Capacity, enrollment and waitlist counters. WebSoc reports all of them as text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Enrollment {
    #[serde(default)]
    pub max_capacity: String,
    #[serde(default)]
    pub total_enrolled: String,
    #[serde(default)]
    pub section_enrolled: String,
    #[serde(default)]
    pub num_on_waitlist: String,
    #[serde(default)]
    pub num_waitlist_cap: String,
    #[serde(default)]
    pub num_requested: String,
    #[serde(default)]
    pub num_new_only_reserved: String,
}

// ---------------------------------------------------------------------------
// Normalized tree
// ---------------------------------------------------------------------------

/// The deduplicated, normalized and sorted union of every successful sub-query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergedTree {
    pub schools: Vec<School>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct School {
    pub name: String,
    pub comment: String,
    pub departments: Vec<Department>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Department {
    pub name: String,
    pub code: String,
    pub comment: String,
    pub course_number_range_comments: Vec<String>,
    pub section_code_range_comments: Vec<String>,
    pub courses: Vec<Course>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub dept_code: String,
    pub course_number: String,
    pub title: String,
    pub comment: String,
    pub prerequisite_link: String,
    pub sections: Vec<Section>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub section_code: String,
    pub section_type: String,
    pub section_num: String,
    pub units: String,
    pub instructors: Vec<String>,
    pub meetings: Vec<Meeting>,
    pub final_exam: FinalExam,
    pub enrollment: Enrollment,
    pub restrictions: String,
    pub status: String,
    pub comment: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meeting {
    #[serde(rename = "timeIsTBA")]
    pub time_is_tba: bool,
    pub bldg: Vec<String>,
    pub days: Option<Vec<DayOfWeek>>,
    pub start_time: Option<TimeOfDay>,
    pub end_time: Option<TimeOfDay>,
}

/// A wall-clock time in 24-hour form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimeOfDay {
    pub hour: u8,
    pub minute: u8,
}

impl TimeOfDay {
    /// Builds a time from minutes past midnight.
    pub fn from_minutes(minutes: u32) -> Self {
        Self {
            hour: (minutes / 60) as u8,
            minute: (minutes % 60) as u8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "examStatus")]
pub enum FinalExam {
    #[serde(rename = "NO_FINAL")]
    NoFinal,
    #[serde(rename = "TBA_FINAL")]
    Tba,
    #[serde(rename = "SCHEDULED_FINAL", rename_all = "camelCase")]
    Scheduled {
        day_of_week: DayOfWeek,
        month: Month,
        day: u8,
        start_time: TimeOfDay,
        end_time: TimeOfDay,
        bldg: Vec<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DayOfWeek {
    Sun,
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
    Sat,
}

impl DayOfWeek {
    /// Parses a three-letter day name such as `"Mon"`.
    pub fn from_abbreviation(s: &str) -> Option<Self> {
        match s {
            "Sun" => Some(Self::Sun),
            "Mon" => Some(Self::Mon),
            "Tue" => Some(Self::Tue),
            "Wed" => Some(Self::Wed),
            "Thu" => Some(Self::Thu),
            "Fri" => Some(Self::Fri),
            "Sat" => Some(Self::Sat),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Month {
    Jan,
    Feb,
    Mar,
    Apr,
    May,
    Jun,
    Jul,
    Aug,
    Sep,
    Oct,
    Nov,
    Dec,
}

const MONTHS: [(&str, Month); 12] = [
    ("Jan", Month::Jan),
    ("Feb", Month::Feb),
    ("Mar", Month::Mar),
    ("Apr", Month::Apr),
    ("May", Month::May),
    ("Jun", Month::Jun),
    ("Jul", Month::Jul),
    ("Aug", Month::Aug),
    ("Sep", Month::Sep),
    ("Oct", Month::Oct),
    ("Nov", Month::Nov),
    ("Dec", Month::Dec),
];

impl Month {
    /// Looks a month up in the three-letter abbreviation table.
    pub fn from_abbreviation(s: &str) -> Option<Self> {
        MONTHS.iter().find(|(abbr, _)| *abbr == s).map(|(_, m)| *m)
    }

    /// Zero-based month index (`Jan` is 0, `Dec` is 11).
    pub fn index(self) -> u8 {
        self as u8
    }
}
