// Layout constants for the SynergyED diagnostic log directory
pub const CONTAINER_LOG_NAME: &str = "EDAutoLog.dat";
pub const CONTAINER_SUFFIX: &str = "_EDAutoLog";
pub const FLAT_LOG_SUFFIX: &str = "_Jeol_MicroED.dat";

/// Where the instrument control software writes its logs on the acquisition PC
pub const DEFAULT_LOG_DIRECTORY: &str = r"C:\Xcalibur\log\SynergyED_DiagnosticData";

// Log file layout
pub const HEADER_LINE_COUNT: usize = 2;

/// The numeric channels written by the instrument, in file order
pub const CHANNELS: [&str; 15] = [
    "HT [kV]",
    "Beam Current [uA]",
    "Filament Current [A]",
    "Penning PeG1",
    "Column PiG1",
    "Gun PiG2",
    "Detector PiG3",
    "Specimen PiG4",
    "RT1 PiG5",
    "Bias coarse",
    "Bias fine",
    "Stage X [um]",
    "Stage Y [um]",
    "Stage Z [um]",
    "Stage TX [deg]",
];

// Trigger evaluation
pub const EQUALS_TOLERANCE: f64 = 0.001;

// Notifications
pub const SUBJECT_PREFIX: &str = "SynergyED Alert";
pub const PRODUCT_NAME: &str = "SynergyED Log Plotter";
pub const DEFAULT_SMTP_PORT: u16 = 587;
