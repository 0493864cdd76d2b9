use std::path::Path;

use fee_domain::{PaymentMethod, Student};
use rust_decimal::Decimal;

use crate::cli::commands::usage_error;
use crate::cli::context::{CommandError, CommandResult, ShellContext};
use crate::cli::format::{format_amount, Alignment, Table};
use crate::cli::output;
use crate::cli::registry::CommandEntry;

const STUDENTS_USAGE: &str = "students <school>";
const IMPORT_USAGE: &str = "import <dataset.json>";
const PAY_USAGE: &str = "pay <school> <student> <year> <term> <amount> [method]";

pub(crate) fn definitions() -> Vec<CommandEntry> {
    vec![
        CommandEntry::new("schools", "List schools in the data root", "schools", cmd_schools),
        CommandEntry::new(
            "students",
            "List the students of a school",
            STUDENTS_USAGE,
            cmd_students,
        ),
        CommandEntry::new(
            "import",
            "Import a school dataset file",
            IMPORT_USAGE,
            cmd_import,
        ),
        CommandEntry::new("pay", "Record a payment for a term", PAY_USAGE, cmd_pay),
    ]
}

fn cmd_schools(context: &mut ShellContext, _args: &[&str]) -> CommandResult {
    let schools = context.ledger.schools()?;
    if schools.is_empty() {
        output::info("No schools yet.");
        output::hint("Use `import <dataset.json>` to add one.");
        return Ok(());
    }

    let mut table = Table::new(&[
        ("Code", Alignment::Left),
        ("Name", Alignment::Left),
        ("Students", Alignment::Right),
    ]);
    for school in &schools {
        let students = context.ledger.students(school)?.len();
        table.push(vec![
            school.code.clone(),
            school.name.clone(),
            students.to_string(),
        ]);
    }
    output::section("Schools");
    output::info(table.render());
    Ok(())
}

fn cmd_students(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let reference = args.first().ok_or_else(|| usage_error(STUDENTS_USAGE))?;
    let school = context.ledger.find_school(reference)?;
    let students = context.ledger.students(&school)?;

    output::section(format!("Students of {} ({})", school.name, school.code));
    if students.is_empty() {
        output::info("No students recorded.");
        return Ok(());
    }
    let mut table = Table::new(&[
        ("Admission", Alignment::Left),
        ("Name", Alignment::Left),
        ("Grade", Alignment::Left),
        ("Joined", Alignment::Left),
    ]);
    for student in &students {
        table.push(vec![
            student.admission_number.clone(),
            student.name.clone(),
            grade_label(student),
            join_label(student),
        ]);
    }
    output::info(table.render());
    Ok(())
}

fn cmd_import(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let path = args.first().ok_or_else(|| usage_error(IMPORT_USAGE))?;
    let dataset = context.ledger.import_dataset(Path::new(path))?;
    output::success(format!(
        "Imported {} ({}) with {} student(s) and {} payment(s).",
        dataset.school.name,
        dataset.school.code,
        dataset.students.len(),
        dataset.payments.len()
    ));
    Ok(())
}

fn cmd_pay(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    if args.len() < 5 {
        return Err(usage_error(PAY_USAGE));
    }
    let (school, student) = context.school_and_student(args, PAY_USAGE)?;
    let amount = parse_amount(args[4])?;
    let method = match args.get(5) {
        Some(value) => PaymentMethod::parse(value).ok_or_else(|| {
            CommandError::InvalidArguments(format!("unknown payment method `{}`", value))
        })?,
        None => PaymentMethod::default(),
    };

    let payment = context
        .ledger
        .record_payment(&school, &student, Some(args[2]), args[3], amount, method)?;
    output::success(format!(
        "Recorded {} of {} for {} ({}).",
        payment.receipt_number,
        format_amount(payment.amount, context.currency()),
        student.name,
        student.admission_number
    ));
    Ok(())
}

fn parse_amount(value: &str) -> Result<Decimal, CommandError> {
    value
        .replace(',', "")
        .parse::<Decimal>()
        .map_err(|_| CommandError::InvalidArguments(format!("invalid amount `{}`", value)))
}

fn grade_label(student: &Student) -> String {
    match &student.grade {
        Some(grade) => match &grade.class_name {
            Some(class) => format!("{} / {}", grade.grade_name, class),
            None => grade.grade_name.clone(),
        },
        None => "-".into(),
    }
}

fn join_label(student: &Student) -> String {
    match (student.join_point(), student.admission_date) {
        (Some((year, term)), _) => format!("{} {}", term, year),
        (None, Some(date)) => date.format("%Y-%m-%d").to_string(),
        (None, None) => match student.join_academic_year {
            Some(year) => year.to_string(),
            None => "-".into(),
        },
    }
}
