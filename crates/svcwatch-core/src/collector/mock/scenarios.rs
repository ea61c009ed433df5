//! Pre-built mock invoker scenarios.

use super::invoker::MockInvoker;
use crate::collector::target::CollectionTarget;

impl MockInvoker {
    /// A Windows host with a few services.
    ///
    /// - `Spooler`: running for an hour
    /// - `W32Time`: stopped
    /// - `^sql.*`: two SQL Server services
    /// - `Missing`: query exits with code 1
    pub fn typical_windows_host() -> Self {
        let mut invoker = Self::new();
        invoker
            .respond(
                CollectionTarget::ExactName("Spooler".into()),
                0,
                "\
serviceName=Spooler
serviceUpTimeInSec=3600
serviceStatus=4
",
            )
            .respond(
                CollectionTarget::ExactName("W32Time".into()),
                0,
                "\
serviceName=W32Time
serviceUpTimeInSec=0
serviceStatus=1
",
            )
            .respond(
                CollectionTarget::RegexPattern("^sql.*".into()),
                0,
                "\
serviceName=sqlbrowser
serviceUpTimeInSec=86400
serviceStatus=4
SERVICE_DELIMITERserviceName=sqlwriter
serviceUpTimeInSec=0
serviceStatus=1
",
            )
            .respond(
                CollectionTarget::ExactName("Missing".into()),
                1,
                "service not found: Missing\n",
            );
        invoker
    }
}
