use fee_core::{CoreError, DefaultFeeTable};
use fee_domain::{FeeSource, FeeStatement, TermBalance};
use rust_decimal::Decimal;

use crate::cli::commands::usage_error;
use crate::cli::context::{CommandResult, ShellContext};
use crate::cli::format::{format_amount, format_date, format_number, Alignment, Table};
use crate::cli::output;
use crate::cli::registry::CommandEntry;

const STATEMENT_USAGE: &str = "statement <school> <student> [year] [--json]";
const JSON_FLAG: &str = "--json";
const TERMS_USAGE: &str = "terms <school> <student> [year]";
const TRANSACTIONS_USAGE: &str = "transactions <school> <student> [year]";
const CLOSE_USAGE: &str = "close-year <school> <student> [year]";
const DEFAULTS_USAGE: &str = "defaults <grade name>";

pub(crate) fn definitions() -> Vec<CommandEntry> {
    vec![
        CommandEntry::new(
            "statement",
            "Show a student's fee statement",
            STATEMENT_USAGE,
            cmd_statement,
        ),
        CommandEntry::new(
            "terms",
            "Show per-term balances and carry-forward",
            TERMS_USAGE,
            cmd_terms,
        ),
        CommandEntry::new(
            "transactions",
            "Show charges and payments with running balance",
            TRANSACTIONS_USAGE,
            cmd_transactions,
        ),
        CommandEntry::new(
            "close-year",
            "Record the year's closing balance for the next year",
            CLOSE_USAGE,
            cmd_close_year,
        ),
        CommandEntry::new(
            "defaults",
            "Show the default fees for a grade",
            DEFAULTS_USAGE,
            cmd_defaults,
        ),
    ]
}

fn cmd_statement(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let as_json = args.contains(&JSON_FLAG);
    let args: Vec<&str> = args.iter().copied().filter(|arg| *arg != JSON_FLAG).collect();
    let (school, student) = context.school_and_student(&args, STATEMENT_USAGE)?;
    let statement = context.ledger.statement(&school, &student, args.get(2).copied())?;
    if as_json {
        let rendered = serde_json::to_string_pretty(&statement)
            .map_err(|err| CoreError::Serde(err.to_string()))?;
        output::info(rendered);
        return Ok(());
    }
    let currency = context.currency();

    output::section(format!(
        "Fee statement: {} ({})",
        statement.student.name, statement.student.admission_number
    ));
    output::info(format!("  School         : {} ({})", school.name, school.code));
    output::info(format!(
        "  Grade          : {}",
        statement.student.grade_name.as_deref().unwrap_or("-")
    ));
    output::info(format!("  Academic year  : {}", statement.academic_year));
    output::info("");
    output::info(term_table(&statement.term_balances, currency));
    output::info("");
    print_totals(&statement, currency);
    Ok(())
}

fn cmd_terms(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let (school, student) = context.school_and_student(args, TERMS_USAGE)?;
    let statement = context.ledger.preview(&school, &student, args.get(2).copied())?;

    output::section(format!(
        "Terms {} for {}",
        statement.academic_year, statement.student.admission_number
    ));
    output::info(term_table(&statement.term_balances, context.currency()));
    if let Some(carry) = &statement.year_end_carry_forward {
        output::info(format!(
            "Carry into {}: {}",
            carry.next_academic_year,
            format_amount(carry.amount, context.currency())
        ));
    }
    Ok(())
}

fn cmd_transactions(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let (school, student) = context.school_and_student(args, TRANSACTIONS_USAGE)?;
    let statement = context.ledger.preview(&school, &student, args.get(2).copied())?;

    output::section(format!(
        "Transactions {} for {}",
        statement.academic_year, statement.student.admission_number
    ));
    if statement.transactions.is_empty() {
        output::info("No transactions.");
        return Ok(());
    }

    let mut table = Table::new(&[
        ("Date", Alignment::Left),
        ("Description", Alignment::Left),
        ("Debit", Alignment::Right),
        ("Credit", Alignment::Right),
        ("Balance", Alignment::Right),
    ]);
    for entry in &statement.transactions {
        table.push(vec![
            format_date(entry.date),
            entry.description.clone(),
            blank_if_zero(entry.debit()),
            blank_if_zero(entry.credit()),
            format_number(entry.running_balance),
        ]);
    }
    output::info(table.render());
    output::info(format!(
        "Academic year outstanding: {}",
        format_amount(statement.academic_year_outstanding, context.currency())
    ));
    Ok(())
}

fn cmd_close_year(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let (school, student) = context.school_and_student(args, CLOSE_USAGE)?;
    let statement = context.ledger.close_year(&school, &student, args.get(2).copied())?;
    output::success(format!(
        "Closed {} for {} at {}.",
        statement.academic_year,
        statement.student.admission_number,
        format_amount(statement.year_end_balance(), context.currency())
    ));
    Ok(())
}

fn cmd_defaults(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    if args.is_empty() {
        return Err(usage_error(DEFAULTS_USAGE));
    }
    let grade = args.join(" ");
    let fee = DefaultFeeTable::for_grade(&grade);

    output::section(format!("Default fees for `{}` ({})", grade, fee.tier));
    let mut table = Table::new(&[("Item", Alignment::Left), ("Amount", Alignment::Right)]);
    for (item, amount) in fee.breakdown.iter() {
        table.push(vec![item.to_string(), format_number(amount)]);
    }
    output::info(table.render());
    output::info(format!(
        "Total per term: {}",
        format_amount(fee.total_amount(), context.currency())
    ));
    Ok(())
}

fn term_table(balances: &[TermBalance], currency: &str) -> String {
    if balances.is_empty() {
        return "No terms billed.".into();
    }
    let mut table = Table::new(&[
        ("Term", Alignment::Left),
        ("Charges", Alignment::Right),
        ("Paid", Alignment::Right),
        ("Carry in", Alignment::Right),
        ("Balance", Alignment::Right),
        ("Carry out", Alignment::Right),
        ("Source", Alignment::Left),
    ]);
    for balance in balances {
        table.push(vec![
            balance.term.to_string(),
            format_number(balance.total_amount),
            format_number(balance.paid_amount),
            format_number(balance.carry_forward),
            format_number(balance.balance),
            format_number(balance.carry_to_next),
            source_label(balance.fee_source).to_string(),
        ]);
    }
    format!("Amounts in {}\n{}", currency, table.render())
}

fn print_totals(statement: &FeeStatement, currency: &str) {
    output::info(format!(
        "  Academic year outstanding : {}",
        format_amount(statement.academic_year_outstanding, currency)
    ));
    output::info(format!(
        "  Arrears                   : {}",
        format_amount(statement.arrears, currency)
    ));
    output::info(format!(
        "  Outstanding               : {}",
        format_amount(statement.outstanding, currency)
    ));
    if let Some(carry) = &statement.year_end_carry_forward {
        output::info(format!(
            "  Carry into {}           : {}",
            carry.next_academic_year,
            format_amount(carry.amount, currency)
        ));
    }
    if statement.uses_default_fees() {
        output::warning("Default fees applied where no fee structure is recorded.");
    }
}

fn source_label(source: FeeSource) -> &'static str {
    match source {
        FeeSource::Authoritative => "recorded",
        FeeSource::Synthesized => "default",
    }
}

fn blank_if_zero(amount: Decimal) -> String {
    if amount.is_zero() {
        String::new()
    } else {
        format_number(amount)
    }
}
