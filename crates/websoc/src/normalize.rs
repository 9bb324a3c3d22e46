//! Conversion of WebSoc's free-form section text into typed meetings and finals.
//!
//! WebSoc reports meeting times as 12-hour ranges where only the end time
//! carries an `a`/`p` marker (`"12:30-1:50p"`), day lists as packed tokens
//! (`"TuTh"`), and finals as a single line
//! (`"Mon Dec 11 10:30-12:30pm @ ICS 174"`).

use crate::error::NormalizeError;
use crate::merge::dedup_meetings;
use crate::types::*;
use regex::Regex;
use std::sync::LazyLock;
use tracing::warn;

const HALF_DAY: u32 = 12 * 60;

static TIME_RANGE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(\d{1,2}):(\d{2})\s*-\s*(\d{1,2}):(\d{2})\s*([ap])?m?\s*$").unwrap()
});
static DAY_TOKEN_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Su|Sa|Tu|Th|M|W|F").unwrap());

/// Parses a `"H:MM-H:MM[a|p]"` range into start and end times.
///
/// Both ends are read on a 12-hour clock. A `p` marker on the end time moves
/// both ends into the afternoon, after which a start that lands past the end
/// is pulled back into the morning (`"11:00-12:20p"`). Without a marker, a
/// start past the end means the range crosses noon (`"10:30-12:30"`).
pub fn parse_time_range(raw: &str) -> Result<(TimeOfDay, TimeOfDay), NormalizeError> {
    let caps = TIME_RANGE_REGEX
        .captures(raw)
        .ok_or_else(|| NormalizeError::TimeRange(raw.to_string()))?;

    let num = |i: usize| -> Result<u32, NormalizeError> {
        caps[i]
            .parse::<u32>()
            .map_err(|_| NormalizeError::TimeRange(raw.to_string()))
    };
    let (start_hr, start_min, end_hr, end_min) = (num(1)?, num(2)?, num(3)?, num(4)?);
    if start_hr > 12 || end_hr > 12 || start_min > 59 || end_min > 59 {
        return Err(NormalizeError::TimeRange(raw.to_string()));
    }

    let mut start = (start_hr % 12) * 60 + start_min;
    let mut end = (end_hr % 12) * 60 + end_min;
    let is_pm = caps
        .get(5)
        .is_some_and(|m| m.as_str().eq_ignore_ascii_case("p"));

    if is_pm {
        start += HALF_DAY;
        end += HALF_DAY;
        if start > end {
            start -= HALF_DAY;
        }
    } else if start > end {
        end += HALF_DAY;
    }

    Ok((TimeOfDay::from_minutes(start), TimeOfDay::from_minutes(end)))
}

/// Parses packed day tokens (`"MWF"`, `"TuTh"`, `"Sa Su"`) in the order given.
pub fn parse_days(raw: &str) -> Result<Vec<DayOfWeek>, NormalizeError> {
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    let mut days = Vec::new();
    let mut cursor = 0;

    for m in DAY_TOKEN_REGEX.find_iter(&compact) {
        if m.start() != cursor {
            return Err(NormalizeError::Days(raw.to_string()));
        }
        cursor = m.end();
        days.push(match m.as_str() {
            "Su" => DayOfWeek::Sun,
            "M" => DayOfWeek::Mon,
            "Tu" => DayOfWeek::Tue,
            "W" => DayOfWeek::Wed,
            "Th" => DayOfWeek::Thu,
            "F" => DayOfWeek::Fri,
            _ => DayOfWeek::Sat,
        });
    }

    if cursor != compact.len() || days.is_empty() {
        return Err(NormalizeError::Days(raw.to_string()));
    }
    Ok(days)
}

/// Parses a final exam string. `meetings` supplies the fallback building when
/// the string has no `@ <buildings>` part.
pub fn parse_final_exam(raw: &str, meetings: &[RawMeeting]) -> Result<FinalExam, NormalizeError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(FinalExam::NoFinal);
    }
    if trimmed == "TBA" {
        return Ok(FinalExam::Tba);
    }

    let malformed = || NormalizeError::FinalExam(raw.to_string());

    let (schedule, buildings) = match trimmed.split_once('@') {
        Some((schedule, buildings)) => (schedule, Some(buildings)),
        None => (trimmed, None),
    };

    let tokens: Vec<&str> = schedule
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|t| !t.is_empty())
        .collect();
    if tokens.len() < 4 {
        return Err(malformed());
    }

    let day_of_week = DayOfWeek::from_abbreviation(tokens[0]).ok_or_else(malformed)?;
    let month = Month::from_abbreviation(tokens[1]).ok_or_else(malformed)?;
    let day = tokens[2]
        .parse::<u8>()
        .ok()
        .filter(|d| (1..=31).contains(d))
        .ok_or_else(malformed)?;
    // "10:30-12:30 pm" splits into two tokens
    let (start_time, end_time) =
        parse_time_range(&tokens[3..].join("")).map_err(|_| malformed())?;

    let bldg = match buildings {
        Some(list) => list
            .split(',')
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .map(str::to_string)
            .collect(),
        None => meetings
            .first()
            .and_then(|m| m.bldg.first())
            .cloned()
            .into_iter()
            .collect(),
    };

    Ok(FinalExam::Scheduled {
        day_of_week,
        month,
        day,
        start_time,
        end_time,
        bldg,
    })
}

/// Normalizes one raw meeting.
pub fn normalize_meeting(raw: &RawMeeting) -> Meeting {
    if raw.time.trim() == "TBA" {
        return Meeting {
            time_is_tba: true,
            bldg: raw.bldg.clone(),
            days: None,
            start_time: None,
            end_time: None,
        };
    }

    let days = match parse_days(&raw.days) {
        Ok(days) => Some(days),
        Err(e) => {
            warn!(error = %e, "Leaving meeting days unset");
            None
        }
    };
    let (start_time, end_time) = match parse_time_range(&raw.time) {
        Ok((start, end)) => (Some(start), Some(end)),
        Err(e) => {
            warn!(error = %e, "Leaving meeting times unset");
            (None, None)
        }
    };

    Meeting {
        time_is_tba: false,
        bldg: raw.bldg.clone(),
        days,
        start_time,
        end_time,
    }
}

/// Replaces a section's meetings and final exam with their typed forms.
/// Every other field passes through unchanged.
pub fn normalize_section(raw: RawSection) -> Section {
    let meetings = dedup_meetings(raw.meetings);

    let final_exam = parse_final_exam(&raw.final_exam, &meetings).unwrap_or_else(|e| {
        warn!(
            section_code = %raw.section_code,
            error = %e,
            "Treating unparseable final exam as TBA"
        );
        FinalExam::Tba
    });

    Section {
        section_code: raw.section_code,
        section_type: raw.section_type,
        section_num: raw.section_num,
        units: raw.units,
        instructors: raw.instructors,
        meetings: meetings.iter().map(normalize_meeting).collect(),
        final_exam,
        enrollment: raw.enrollment,
        restrictions: raw.restrictions,
        status: raw.status,
        comment: raw.comment,
    }
}

/// Normalizes every section of a raw tree, keeping the tree shape.
pub fn normalize_tree(raw: RawPartialTree) -> MergedTree {
    let schools = raw
        .schools
        .into_iter()
        .map(|school| School {
            name: school.name,
            comment: school.comment,
            departments: school
                .departments
                .into_iter()
                .map(|dept| Department {
                    name: dept.name,
                    code: dept.code,
                    comment: dept.comment,
                    course_number_range_comments: dept.course_number_range_comments,
                    section_code_range_comments: dept.section_code_range_comments,
                    courses: dept
                        .courses
                        .into_iter()
                        .map(|course| Course {
                            dept_code: course.dept_code,
                            course_number: course.course_number,
                            title: course.title,
                            comment: course.comment,
                            prerequisite_link: course.prerequisite_link,
                            sections: course.sections.into_iter().map(normalize_section).collect(),
                        })
                        .collect(),
                })
                .collect(),
        })
        .collect();

    MergedTree { schools }
}
