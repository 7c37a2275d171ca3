//! Command handlers

use anyhow::Result;
use chrono::NaiveDate;
use clap::{Args, Subcommand};
use lunch_ledger::{
    DeliveryState, NewStudent, PermissionFilter, PermissionId, StudentDirectory, StudentId,
};
use serde::Serialize;

use crate::Services;

/// Student directory commands
#[derive(Subcommand)]
pub enum StudentCommand {
    /// Register a student
    Add(StudentFields),
    /// List every student
    List,
    /// Show one student
    Show {
        /// Student id
        id: StudentId,
    },
    /// Replace a student's fields
    Update {
        /// Student id
        id: StudentId,
        #[command(flatten)]
        fields: StudentFields,
    },
    /// Remove a student without permissions
    Remove {
        /// Student id
        id: StudentId,
    },
}

/// Student fields supplied on the command line
#[derive(Args)]
pub struct StudentFields {
    /// Registration code (unique)
    #[arg(long)]
    pub code: String,
    /// Display name
    #[arg(long)]
    pub name: String,
    /// Photo reference
    #[arg(long, default_value = "")]
    pub photo: String,
}

impl From<StudentFields> for NewStudent {
    fn from(fields: StudentFields) -> Self {
        NewStudent::new(fields.code, fields.name, fields.photo)
    }
}

/// Permission commands
#[derive(Subcommand)]
pub enum PermissionCommand {
    /// Allow a student to collect lunch on a date
    Grant(PermissionFields),
    /// List permissions
    List {
        /// Only this release date (YYYY-MM-DD)
        #[arg(short, long)]
        date: Option<NaiveDate>,
        /// Only delivered permissions
        #[arg(long, conflicts_with = "pending")]
        delivered: bool,
        /// Only pending permissions
        #[arg(long)]
        pending: bool,
    },
    /// Replace the student, date and quantity of a permission
    Update {
        /// Permission id
        id: PermissionId,
        #[command(flatten)]
        fields: PermissionFields,
    },
    /// Delete a permission
    Revoke {
        /// Permission id
        id: PermissionId,
    },
}

/// Permission fields supplied on the command line
#[derive(Args)]
pub struct PermissionFields {
    /// Student id
    #[arg(long)]
    pub student: StudentId,
    /// Release date (YYYY-MM-DD)
    #[arg(long)]
    pub date: NaiveDate,
    /// Number of items, 1 to 3
    #[arg(long, default_value_t = 1, allow_negative_numbers = true)]
    pub quantity: i64,
}

/// Delivery confirmation
#[derive(Args)]
pub struct DeliveryCommand {
    /// Permission being fulfilled
    pub permission_id: PermissionId,
}

#[derive(Serialize)]
struct Created<T> {
    id: T,
}

#[derive(Serialize)]
struct Updated {
    updated: usize,
}

#[derive(Serialize)]
struct Deleted {
    deleted: usize,
}

#[derive(Serialize)]
struct Delivered {
    delivered: bool,
}

/// Print a value as pretty JSON on stdout
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Run a student directory command
pub async fn handle_student_command(services: &Services, cmd: StudentCommand) -> Result<()> {
    let directory = &services.directory;
    match cmd {
        StudentCommand::Add(fields) => {
            let id = directory.create_student(fields.into()).await?;
            print_json(&Created { id })
        }
        StudentCommand::List => print_json(&directory.list_students().await?),
        StudentCommand::Show { id } => match directory.get_student(id).await? {
            Some(student) => print_json(&student),
            None => anyhow::bail!("student {id} not found"),
        },
        StudentCommand::Update { id, fields } => {
            let updated = directory.update_student(id, fields.into()).await?;
            print_json(&Updated { updated })
        }
        StudentCommand::Remove { id } => {
            let deleted = directory.delete_student(id).await?;
            print_json(&Deleted { deleted })
        }
    }
}

/// Run a permission command
pub async fn handle_permission_command(services: &Services, cmd: PermissionCommand) -> Result<()> {
    let ledger = &services.ledger;
    match cmd {
        PermissionCommand::Grant(fields) => {
            let id = ledger
                .create_permission(fields.student, fields.date, fields.quantity)
                .await?;
            print_json(&Created { id })
        }
        PermissionCommand::List {
            date,
            delivered,
            pending,
        } => {
            let state = match (delivered, pending) {
                (true, _) => DeliveryState::Delivered,
                (_, true) => DeliveryState::Pending,
                _ => DeliveryState::Any,
            };
            let filter = PermissionFilter {
                release_date: date,
                state,
            };
            print_json(&ledger.list_permissions(filter).await?)
        }
        PermissionCommand::Update { id, fields } => {
            let updated = ledger
                .update_permission(id, fields.student, fields.date, fields.quantity)
                .await?;
            print_json(&Updated { updated })
        }
        PermissionCommand::Revoke { id } => {
            let deleted = ledger.delete_permission(id).await?;
            print_json(&Deleted { deleted })
        }
    }
}

/// Run a delivery confirmation
pub async fn handle_delivery_command(services: &Services, cmd: DeliveryCommand) -> Result<()> {
    services.ledger.confirm_delivery(cmd.permission_id).await?;
    print_json(&Delivered { delivered: true })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Cli;
    use clap::{CommandFactory, Parser};

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn grant_parses_typed_arguments() {
        let cli = Cli::try_parse_from([
            "lunch",
            "permission",
            "grant",
            "--student",
            "3",
            "--date",
            "2024-05-01",
            "--quantity",
            "2",
        ])
        .expect("parse");
        match cli.command {
            crate::Commands::Permission(PermissionCommand::Grant(fields)) => {
                assert_eq!(fields.student, StudentId::new(3));
                assert_eq!(fields.date, NaiveDate::from_ymd_opt(2024, 5, 1).expect("date"));
                assert_eq!(fields.quantity, 2);
            }
            _ => panic!("expected permission grant"),
        }
    }

    #[test]
    fn malformed_date_is_rejected() {
        assert!(Cli::try_parse_from(["lunch", "deliveries", "--date", "05/01/2024"]).is_err());
    }

    #[test]
    fn delivered_and_pending_conflict() {
        assert!(
            Cli::try_parse_from(["lunch", "permission", "list", "--delivered", "--pending"])
                .is_err()
        );
    }
}
