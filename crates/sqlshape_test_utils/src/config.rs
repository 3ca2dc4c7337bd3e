//! SQL Server versions available to the Docker test harness.

use std::fmt;

/// Password of the `sa` login inside the test containers.
pub const TEST_SA_PASSWORD: &str = "Sqlshape_Test_123!";

/// Database version enum for multi-version testing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DbVersion {
    /// Microsoft SQL Server 2019
    Mssql2019,
    /// Microsoft SQL Server 2022
    Mssql2022,
}

impl DbVersion {
    /// Get the docker-compose service name for this version.
    pub fn service_name(&self) -> &'static str {
        match self {
            DbVersion::Mssql2019 => "mssql2019",
            DbVersion::Mssql2022 => "mssql2022",
        }
    }

    /// Get the host port for this database version.
    pub fn port(&self) -> u16 {
        match self {
            DbVersion::Mssql2019 => 11433,
            DbVersion::Mssql2022 => 11434,
        }
    }

    /// ADO.NET connection string for the `sa` login on `localhost`.
    pub fn connection_string(&self) -> String {
        format!(
            "server=tcp:localhost,{};user=sa;password={};TrustServerCertificate=true",
            self.port(),
            TEST_SA_PASSWORD
        )
    }

    /// Get all versions.
    pub fn all() -> &'static [DbVersion] {
        &[DbVersion::Mssql2019, DbVersion::Mssql2022]
    }
}

impl fmt::Display for DbVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DbVersion::Mssql2019 => write!(f, "SQL Server 2019"),
            DbVersion::Mssql2022 => write!(f, "SQL Server 2022"),
        }
    }
}
