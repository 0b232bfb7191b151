//! Command codes carried in `Command` fields.

macro_rules! opcodes {
    ($($(#[$meta:meta])* $name:ident = $value:literal,)+) => {
        /// Every command the panel protocol knows about.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub enum Opcode {
            $($(#[$meta])* $name,)+
        }

        impl Opcode {
            pub const ALL: &'static [Opcode] = &[$(Opcode::$name,)+];

            pub const fn to_wire(self) -> i32 {
                match self {
                    $(Opcode::$name => $value,)+
                }
            }

            pub const fn from_wire(value: i32) -> Option<Opcode> {
                match value {
                    $($value => Some(Opcode::$name),)+
                    _ => None,
                }
            }

            pub const fn name(self) -> &'static str {
                match self {
                    $(Opcode::$name => stringify!($name),)+
                }
            }
        }
    };
}

opcodes! {
    // Framing markers
    Request = 1,
    Reply = 2,
    Ok = 3,
    Fail = 4,
    /// More frames follow on this connection before the final status.
    Continue = 5,

    // Connection management
    OpenConnection = 10,
    CloseConnection = 11,

    // Engine client requests
    GetFactoryList = 100,
    GetFactoryName = 101,
    GetFactoryLocales = 102,
    GetFactoryLanguage = 103,
    GetFactoryIconFile = 104,
    GetFactoryHelp = 105,
    NewInstance = 110,
    DeleteInstance = 111,
    DeleteAllInstances = 112,
    ProcessKeyEvent = 120,
    MoveCaret = 121,
    SelectCandidate = 122,
    UpdateLookupTablePageSize = 123,
    LookupTablePageUp = 124,
    LookupTablePageDown = 125,
    Reset = 126,
    FocusIn = 127,
    FocusOut = 128,
    TriggerProperty = 129,
    ProcessHelperEvent = 130,
    UpdateClientCapabilities = 131,
    SetLayout = 132,
    SetImData = 133,
    GetInputPanelGeometry = 140,

    // Engine to client callbacks
    ShowPreeditString = 200,
    HidePreeditString = 201,
    UpdatePreeditString = 202,
    UpdatePreeditCaret = 203,
    ShowAuxString = 204,
    HideAuxString = 205,
    UpdateAuxString = 206,
    ShowLookupTable = 207,
    HideLookupTable = 208,
    UpdateLookupTable = 209,
    CommitString = 210,
    ForwardKeyEvent = 211,
    RegisterProperties = 212,
    UpdateProperty = 213,
    Beep = 214,
    StartHelper = 215,
    StopHelper = 216,
    SendHelperEvent = 217,
    GetSurroundingText = 218,
    DeleteSurroundingText = 219,
    GetSelection = 220,
    SetSelection = 221,

    // Config client requests
    GetConfigString = 300,
    SetConfigString = 301,
    GetConfigInt = 302,
    SetConfigInt = 303,
    GetConfigBool = 304,
    SetConfigBool = 305,
    GetConfigDouble = 306,
    SetConfigDouble = 307,
    GetConfigStringList = 308,
    SetConfigStringList = 309,
    GetConfigIntList = 310,
    SetConfigIntList = 311,
    EraseConfig = 312,
    FlushConfig = 313,
    ReloadConfig = 314,

    // Helper manager requests
    GetHelperList = 400,
    GetActiveHelpers = 401,
    GetIseList = 402,
    RunHelper = 403,
    TerminateHelper = 404,
    RegisterHelper = 405,
    InstallModule = 406,
    UninstallModule = 407,
    RescanModules = 408,

    Exit = 999,
}

impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.name(), self.to_wire())
    }
}
