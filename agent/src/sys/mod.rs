// 🛡️ Modules are private to the agent; traits are the public seams.

pub mod traits;     // Collaborator & capability contracts
pub mod secrets;    // Memory hygiene (AdminSecret)
pub mod firewall;   // Network policy enforcement
pub mod systemd;    // Unit start/stop/is-active
pub mod logs;       // Journal tail
pub mod control;    // stdin FIFO of the game server
pub mod rcon;       // External RCON client
pub mod options;    // servertest.ini option store
