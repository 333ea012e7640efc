//! Test data generation for benchmarks.
//!
//! Students and majors are generated from fixed seeds so every run of a
//! given size loads the same rows.

use blockjoin_core::{Constant, Database, Error, FieldDef, Schema};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const SEED: u64 = 42;

/// Majors as `(id, name, abbreviation)`.
pub const MAJORS: [(i32, &str, &str); 4] = [
    (0, "Computer Science", "CS"),
    (1, "Chemical Engineering", "CHE"),
    (2, "Mechanical Engineering", "ME"),
    (3, "Aerospace Engineering", "ASE"),
];

const FIRST_NAMES: [&str; 40] = [
    "Adam", "Adrian", "Alan", "Alexander", "Andrew", "Anthony", "Austin", "Benjamin", "Blake",
    "Boris", "Brandon", "Brian", "Cameron", "Carl", "Charles", "Christian", "Colin", "Connor",
    "David", "Dominic", "Dylan", "Edward", "Eric", "Evan", "Frank", "Gavin", "Gordon", "Harry",
    "Ian", "Isaac", "Jack", "Jacob", "James", "Jason", "Joe", "John", "Joseph", "Julian",
    "Justin", "Keith",
];

const LAST_NAMES: [&str; 60] = [
    "Abraham", "Allan", "Alsop", "Anderson", "Arnold", "Avery", "Bailey", "Baker", "Ball", "Bell",
    "Berry", "Black", "Bond", "Bower", "Brown", "Buckland", "Burgess", "Butler", "Campbell",
    "Carr", "Chapman", "Clark", "Coleman", "Cornish", "Davidson", "Davies", "Dickens", "Dowd",
    "Duncan", "Dyer", "Edmunds", "Ellison", "Ferguson", "Fisher", "Forsyth", "Fraser", "Gibson",
    "Gill", "Glover", "Graham", "Grant", "Gray", "Greene", "Hamilton", "Hardacre", "Harris",
    "Hart", "Hemmings", "Henderson", "Hill", "Hodges", "Howard", "Hudson", "Hughes", "Hunter",
    "Ince", "Jackson", "Jones", "Kelly", "Kerr",
];

/// Student row data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudentData {
    pub sid: i32,
    pub first_name: String,
    pub last_name: String,
    pub major_id: i32,
    pub grad_year: i32,
}

impl StudentData {
    pub fn to_row(&self) -> Vec<Constant> {
        vec![
            Constant::Int(self.sid),
            Constant::from(self.first_name.as_str()),
            Constant::from(self.last_name.as_str()),
            Constant::Int(self.major_id),
            Constant::Int(self.grad_year),
        ]
    }
}

/// Largest number of distinct names the generator can produce.
pub fn max_students() -> usize {
    FIRST_NAMES.len() * LAST_NAMES.len()
}

/// Generate `n` distinct `(first, last)` names, capped at [`max_students`].
pub fn generate_names(n: usize) -> Vec<(String, String)> {
    let mut rng = StdRng::seed_from_u64(SEED);
    let n = n.min(max_students());
    let mut taken = std::collections::HashSet::with_capacity(n);
    let mut names = Vec::with_capacity(n);
    while names.len() < n {
        let first = FIRST_NAMES[rng.gen_range(0..FIRST_NAMES.len())];
        let last = LAST_NAMES[rng.gen_range(0..LAST_NAMES.len())];
        if taken.insert((first, last)) {
            names.push((first.to_string(), last.to_string()));
        }
    }
    names
}

/// Generate `n` students with ids starting at 1.
pub fn generate_students(n: usize) -> Vec<StudentData> {
    let mut rng = StdRng::seed_from_u64(SEED.wrapping_add(1));
    generate_names(n)
        .into_iter()
        .enumerate()
        .map(|(i, (first_name, last_name))| StudentData {
            sid: i as i32 + 1,
            first_name,
            last_name,
            major_id: rng.gen_range(0..MAJORS.len() as i32),
            grad_year: 2021 + rng.gen_range(0..4),
        })
        .collect()
}

pub fn student_schema() -> Schema {
    Schema::new()
        .with_field(FieldDef::int("sid"))
        .with_field(FieldDef::varchar("sfirstname", 40))
        .with_field(FieldDef::varchar("slastname", 40))
        .with_field(FieldDef::int("majorid"))
        .with_field(FieldDef::int("gradyear"))
}

pub fn major_schema() -> Schema {
    Schema::new()
        .with_field(FieldDef::int("mid"))
        .with_field(FieldDef::varchar("majorname", 40))
        .with_field(FieldDef::varchar("majorabbr", 5))
}

/// Create and fill the `student` and `major` tables.
///
/// With `indexed`, `student.majorid` and `major.mid` are indexed.
pub fn populate(db: &Database, students: usize, indexed: bool) -> Result<(), Error> {
    db.create_table("student", student_schema())?;
    db.insert_rows(
        "student",
        generate_students(students).iter().map(StudentData::to_row),
    )?;
    if indexed {
        db.create_index("smid", "student", "majorid")?;
    }

    db.create_table("major", major_schema())?;
    db.insert_rows(
        "major",
        MAJORS.iter().map(|(id, name, abbr)| {
            vec![Constant::Int(*id), Constant::from(*name), Constant::from(*abbr)]
        }),
    )?;
    if indexed {
        db.create_index("mid", "major", "mid")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_unique_and_deterministic() {
        let names = generate_names(500);
        assert_eq!(names.len(), 500);
        let unique: std::collections::HashSet<_> = names.iter().collect();
        assert_eq!(unique.len(), 500);
        assert_eq!(names, generate_names(500));
    }

    #[test]
    fn test_names_capped() {
        assert_eq!(generate_names(max_students() + 10).len(), max_students());
    }

    #[test]
    fn test_students_in_range() {
        let students = generate_students(200);
        assert_eq!(students[0].sid, 1);
        assert_eq!(students[199].sid, 200);
        for s in &students {
            assert!((0..4).contains(&s.major_id));
            assert!((2021..2025).contains(&s.grad_year));
        }
    }

    #[test]
    fn test_populate() {
        let db = Database::temporary().unwrap();
        populate(&db, 50, true).unwrap();
        assert_eq!(db.catalog().stat_info("student").unwrap().records_output(), 50);
        assert_eq!(db.catalog().stat_info("major").unwrap().records_output(), 4);
        assert_eq!(db.catalog().indexes_for("major").unwrap().len(), 1);
    }
}
