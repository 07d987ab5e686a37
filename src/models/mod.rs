// Domain models

mod container;
mod gpu;
mod network;
mod storage;
mod system;

pub use container::ContainerStat;
pub use gpu::{GpuAccumulator, GpuData, GpuSample};
pub use network::{MAX_NET_MB_PER_SEC, NetIoCounter, NetRates, NetworkIoState};
pub use storage::{FilesystemStat, IoRates, MAX_DISK_MB_PER_SEC};
pub use system::{CombinedSnapshot, HostReading, SystemInfo, SystemStats};
