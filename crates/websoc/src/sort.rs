/// Deterministic ordering of a merged tree
use crate::types::*;
use std::cmp::Ordering;

/// Numeric value of the digits in a course number (`"10A"` -> 10, `"H2"` -> 2).
fn course_number_value(number: &str) -> Option<u64> {
    let digits: String = number.chars().filter(char::is_ascii_digit).collect();
    digits.parse().ok()
}

/// Sections: numeric section code, non-numeric codes last.
pub fn compare_sections(a: &Section, b: &Section) -> Ordering {
    let key = |s: &Section| s.section_code.trim().parse::<u64>().ok();
    match (key(a), key(b)) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
    .then_with(|| a.section_code.cmp(&b.section_code))
}

/// Courses: digits of the course number, then the full number, then the title.
pub fn compare_courses(a: &Course, b: &Course) -> Ordering {
    course_number_value(&a.course_number)
        .cmp(&course_number_value(&b.course_number))
        .then_with(|| a.course_number.cmp(&b.course_number))
        .then_with(|| a.title.cmp(&b.title))
}

pub fn compare_departments(a: &Department, b: &Department) -> Ordering {
    a.code.cmp(&b.code)
}

pub fn compare_schools(a: &School, b: &School) -> Ordering {
    a.name.cmp(&b.name)
}

/// Sorts every level of the tree in place.
pub fn sort_tree(tree: &mut MergedTree) {
    for school in &mut tree.schools {
        for dept in &mut school.departments {
            for course in &mut dept.courses {
                course.sections.sort_by(compare_sections);
            }
            dept.courses.sort_by(compare_courses);
        }
        school.departments.sort_by(compare_departments);
    }
    tree.schools.sort_by(compare_schools);
}

/// Owned variant of [`sort_tree`].
pub fn sorted(mut tree: MergedTree) -> MergedTree {
    sort_tree(&mut tree);
    tree
}
