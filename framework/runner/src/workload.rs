use std::fmt::{Display, Formatter};

const CPU_COMMAND: &str = "dd if=/dev/zero of=/dev/null bs=1M count=1000";
const NETWORK_COMMAND: &str =
    "wget -O /dev/null https://releases.ubuntu.com/22.04/ubuntu-22.04.3-live-server-amd64.iso";

/// The load to generate inside each session once it is ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum WorkloadKind {
    Cpu,
    Network,
    /// Run the CPU workload, then the network workload.
    All,
}

/// A named command to execute inside a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkloadCommand {
    pub name: &'static str,
    pub command: &'static str,
}

impl WorkloadKind {
    pub fn commands(&self) -> Vec<WorkloadCommand> {
        let cpu = WorkloadCommand {
            name: "CPU",
            command: CPU_COMMAND,
        };
        let network = WorkloadCommand {
            name: "Network",
            command: NETWORK_COMMAND,
        };

        match self {
            WorkloadKind::Cpu => vec![cpu],
            WorkloadKind::Network => vec![network],
            WorkloadKind::All => vec![cpu, network],
        }
    }
}

impl Display for WorkloadKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkloadKind::Cpu => f.write_str("cpu"),
            WorkloadKind::Network => f.write_str("network"),
            WorkloadKind::All => f.write_str("all"),
        }
    }
}
