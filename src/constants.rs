//! Closed value sets for the numeric fields of a Mach-O image.
//!
//! Each enumeration is matched exactly against its table. Values outside the
//! table come back as [`Lookup::Unknown`] carrying the raw value, so callers
//! decide whether that is fatal.

use std::fmt;

pub const MH_MAGIC: u32 = 0xfeed_face;
pub const MH_CIGAM: u32 = 0xcefa_edfe;
pub const MH_MAGIC_64: u32 = 0xfeed_facf;
pub const MH_CIGAM_64: u32 = 0xcffa_edfe;
pub const FAT_MAGIC: u32 = 0xcafe_babe;
pub const FAT_CIGAM: u32 = 0xbeba_feca;
pub const FAT_MAGIC_64: u32 = 0xcafe_babf;
pub const FAT_CIGAM_64: u32 = 0xbfba_feca;

pub const CPU_ARCH_ABI64: i32 = 0x0100_0000;
/// Optional capability flag stored in the top bit of the cpu subtype.
pub const CPU_SUBTYPE_FEATURE_MASK: i32 = 0x8000_0000_u32 as i32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lookup<T, R> {
    Known(T),
    Unknown(R),
}

impl<T, R> Lookup<T, R> {
    pub fn known(self) -> Option<T> {
        match self {
            Lookup::Known(value) => Some(value),
            Lookup::Unknown(_) => None,
        }
    }

    pub fn or_else_raw<E>(self, err: impl FnOnce(R) -> E) -> Result<T, E> {
        match self {
            Lookup::Known(value) => Ok(value),
            Lookup::Unknown(raw) => Err(err(raw)),
        }
    }
}

impl<T: fmt::Display, R> fmt::Display for Lookup<T, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lookup::Known(value) => value.fmt(f),
            Lookup::Unknown(_) => f.write_str("???"),
        }
    }
}

macro_rules! macho_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident: $raw:ty {
            $($variant:ident = $value:expr => $label:literal,)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant,)+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant,)+];

            pub const fn raw(self) -> $raw {
                match self {
                    $($name::$variant => $value,)+
                }
            }

            /// The constant name used by the system headers.
            pub const fn name(self) -> &'static str {
                match self {
                    $($name::$variant => $label,)+
                }
            }

            fn from_raw(raw: $raw) -> Option<Self> {
                Self::ALL.iter().copied().find(|v| v.raw() == raw)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.name())
            }
        }
    };
}

macho_enum! {
    pub enum CpuType: i32 {
        Any = -1 => "CPU_TYPE_ANY",
        Vax = 1 => "CPU_TYPE_VAX",
        Romp = 2 => "CPU_TYPE_ROMP",
        Ns32032 = 4 => "CPU_TYPE_NS32032",
        Ns32332 = 5 => "CPU_TYPE_NS32332",
        Mc680x0 = 6 => "CPU_TYPE_MC680x0",
        I386 = 7 => "CPU_TYPE_I386",
        X86_64 = 7 | CPU_ARCH_ABI64 => "CPU_TYPE_X86_64",
        Mips = 8 => "CPU_TYPE_MIPS",
        Ns32532 = 9 => "CPU_TYPE_NS32532",
        Hppa = 11 => "CPU_TYPE_HPPA",
        Arm = 12 => "CPU_TYPE_ARM",
        Mc88000 = 13 => "CPU_TYPE_MC88000",
        Sparc = 14 => "CPU_TYPE_SPARC",
        I860 = 15 => "CPU_TYPE_I860",
        I860Little = 16 => "CPU_TYPE_I860_LITTLE",
        Rs6000 = 17 => "CPU_TYPE_RS6000",
        PowerPc = 18 => "CPU_TYPE_POWERPC",
        PowerPc64 = 18 | CPU_ARCH_ABI64 => "CPU_TYPE_POWERPC64",
        Veo = 255 => "CPU_TYPE_VEO",
        Arm64 = 12 | CPU_ARCH_ABI64 => "CPU_TYPE_ARM64",
        Arm64_32 = 0x0200_000c => "CPU_TYPE_ARM64_32",
    }
}

impl CpuType {
    pub fn lookup(raw: i32) -> Lookup<Self, i32> {
        Self::from_raw(raw).map_or(Lookup::Unknown(raw), Lookup::Known)
    }

    /// Short architecture name as accepted by `lipo -arch`.
    pub fn arch_name(self) -> String {
        match self {
            CpuType::I386 => "i386".to_string(),
            CpuType::X86_64 => "x86_64".to_string(),
            CpuType::Arm => "arm".to_string(),
            CpuType::Arm64 => "arm64".to_string(),
            CpuType::Arm64_32 => "arm64_32".to_string(),
            CpuType::PowerPc => "ppc".to_string(),
            CpuType::PowerPc64 => "ppc64".to_string(),
            other => other.name().trim_start_matches("CPU_TYPE_").to_lowercase(),
        }
    }

    pub fn is_64(self) -> bool {
        self.raw() != -1 && self.raw() & CPU_ARCH_ABI64 != 0
    }
}

macho_enum! {
    pub enum CpuSubType: i32 {
        Arm64All = 0 => "CPU_SUBTYPE_ARM64_ALL",
        Arm64V8 = 1 => "CPU_SUBTYPE_ARM64_V8",
        Arm64E = 2 => "CPU_SUBTYPE_ARM64E",
        X86All = 3 => "CPU_SUBTYPE_X86_ALL",
        X86Arch1 = 4 => "CPU_SUBTYPE_X86_ARCH1",
        ArmV4T = 5 => "CPU_SUBTYPE_ARM_V4T",
        ArmV6 = 6 => "CPU_SUBTYPE_ARM_V6",
        ArmV5Tej = 7 => "CPU_SUBTYPE_ARM_V5TEJ",
        ArmXscale = 8 => "CPU_SUBTYPE_ARM_XSCALE",
        ArmV7 = 9 => "CPU_SUBTYPE_ARM_V7",
        ArmV7F = 10 => "CPU_SUBTYPE_ARM_V7F",
        ArmV7S = 11 => "CPU_SUBTYPE_ARM_V7S",
        ArmV7K = 12 => "CPU_SUBTYPE_ARM_V7K",
        ArmV8 = 13 => "CPU_SUBTYPE_ARM_V8",
        ArmV6M = 14 => "CPU_SUBTYPE_ARM_V6M",
        ArmV7M = 15 => "CPU_SUBTYPE_ARM_V7M",
        ArmV7Em = 16 => "CPU_SUBTYPE_ARM_V7EM",
    }
}

impl CpuSubType {
    /// Clears [`CPU_SUBTYPE_FEATURE_MASK`] before matching. The unknown
    /// outcome carries the raw value as given.
    pub fn lookup(raw: i32) -> Lookup<Self, i32> {
        Self::from_raw(raw & !CPU_SUBTYPE_FEATURE_MASK).map_or(Lookup::Unknown(raw), Lookup::Known)
    }
}

macho_enum! {
    pub enum FileType: u32 {
        Object = 0x1 => "MH_OBJECT",
        Execute = 0x2 => "MH_EXECUTE",
        FvmLib = 0x3 => "MH_FVMLIB",
        Core = 0x4 => "MH_CORE",
        Preload = 0x5 => "MH_PRELOAD",
        Dylib = 0x6 => "MH_DYLIB",
        Dylinker = 0x7 => "MH_DYLINKER",
        Bundle = 0x8 => "MH_BUNDLE",
        DylibStub = 0x9 => "MH_DYLIB_STUB",
        Dsym = 0xa => "MH_DSYM",
        KextBundle = 0xb => "MH_KEXT_BUNDLE",
        Fileset = 0xc => "MH_FILESET",
    }
}

impl FileType {
    pub fn lookup(raw: u32) -> Lookup<Self, u32> {
        Self::from_raw(raw).map_or(Lookup::Unknown(raw), Lookup::Known)
    }
}

pub const LC_REQ_DYLD: u32 = 0x8000_0000;

macho_enum! {
    pub enum LoadCommandType: u32 {
        Segment = 0x1 => "LC_SEGMENT",
        Symtab = 0x2 => "LC_SYMTAB",
        Symseg = 0x3 => "LC_SYMSEG",
        Thread = 0x4 => "LC_THREAD",
        UnixThread = 0x5 => "LC_UNIXTHREAD",
        LoadFvmLib = 0x6 => "LC_LOADFVMLIB",
        IdFvmLib = 0x7 => "LC_IDFVMLIB",
        Ident = 0x8 => "LC_IDENT",
        FvmFile = 0x9 => "LC_FVMFILE",
        Prepage = 0xa => "LC_PREPAGE",
        Dysymtab = 0xb => "LC_DYSYMTAB",
        LoadDylib = 0xc => "LC_LOAD_DYLIB",
        IdDylib = 0xd => "LC_ID_DYLIB",
        LoadDylinker = 0xe => "LC_LOAD_DYLINKER",
        IdDylinker = 0xf => "LC_ID_DYLINKER",
        PreboundDylib = 0x10 => "LC_PREBOUND_DYLIB",
        Routines = 0x11 => "LC_ROUTINES",
        SubFramework = 0x12 => "LC_SUB_FRAMEWORK",
        SubUmbrella = 0x13 => "LC_SUB_UMBRELLA",
        SubClient = 0x14 => "LC_SUB_CLIENT",
        SubLibrary = 0x15 => "LC_SUB_LIBRARY",
        TwolevelHints = 0x16 => "LC_TWOLEVEL_HINTS",
        PrebindCksum = 0x17 => "LC_PREBIND_CKSUM",
        LoadWeakDylib = 0x18 | LC_REQ_DYLD => "LC_LOAD_WEAK_DYLIB",
        Segment64 = 0x19 => "LC_SEGMENT_64",
        Routines64 = 0x1a => "LC_ROUTINES_64",
        Uuid = 0x1b => "LC_UUID",
        Rpath = 0x1c | LC_REQ_DYLD => "LC_RPATH",
        CodeSignature = 0x1d => "LC_CODE_SIGNATURE",
        SegmentSplitInfo = 0x1e => "LC_SEGMENT_SPLIT_INFO",
        ReexportDylib = 0x1f | LC_REQ_DYLD => "LC_REEXPORT_DYLIB",
        LazyLoadDylib = 0x20 => "LC_LAZY_LOAD_DYLIB",
        EncryptionInfo = 0x21 => "LC_ENCRYPTION_INFO",
        DyldInfo = 0x22 => "LC_DYLD_INFO",
        DyldInfoOnly = 0x22 | LC_REQ_DYLD => "LC_DYLD_INFO_ONLY",
        LoadUpwardDylib = 0x23 | LC_REQ_DYLD => "LC_LOAD_UPWARD_DYLIB",
        VersionMinMacosx = 0x24 => "LC_VERSION_MIN_MACOSX",
        VersionMinIphoneos = 0x25 => "LC_VERSION_MIN_IPHONEOS",
        FunctionStarts = 0x26 => "LC_FUNCTION_STARTS",
        DyldEnvironment = 0x27 => "LC_DYLD_ENVIRONMENT",
        Main = 0x28 | LC_REQ_DYLD => "LC_MAIN",
        DataInCode = 0x29 => "LC_DATA_IN_CODE",
        SourceVersion = 0x2a => "LC_SOURCE_VERSION",
        DylibCodeSignDrs = 0x2b => "LC_DYLIB_CODE_SIGN_DRS",
        EncryptionInfo64 = 0x2c => "LC_ENCRYPTION_INFO_64",
        LinkerOption = 0x2d => "LC_LINKER_OPTION",
        LinkerOptimizationHint = 0x2e => "LC_LINKER_OPTIMIZATION_HINT",
        VersionMinTvos = 0x2f => "LC_VERSION_MIN_TVOS",
        VersionMinWatchos = 0x30 => "LC_VERSION_MIN_WATCHOS",
        Note = 0x31 => "LC_NOTE",
        BuildVersion = 0x32 => "LC_BUILD_VERSION",
        DyldExportsTrie = 0x33 | LC_REQ_DYLD => "LC_DYLD_EXPORTS_TRIE",
        DyldChainedFixups = 0x34 | LC_REQ_DYLD => "LC_DYLD_CHAINED_FIXUPS",
        FilesetEntry = 0x35 | LC_REQ_DYLD => "LC_FILESET_ENTRY",
        AtomInfo = 0x36 => "LC_ATOM_INFO",
    }
}

impl LoadCommandType {
    pub fn lookup(raw: u32) -> Lookup<Self, u32> {
        Self::from_raw(raw).map_or(Lookup::Unknown(raw), Lookup::Known)
    }
}

macho_enum! {
    pub enum Platform: u32 {
        MacOs = 1 => "macOS",
        Ios = 2 => "iOS",
        TvOs = 3 => "tvOS",
        WatchOs = 4 => "watchOS",
        BridgeOs = 5 => "bridgeOS",
        MacCatalyst = 6 => "Mac Catalyst",
        IosSimulator = 7 => "iOS Simulator",
        TvOsSimulator = 8 => "tvOS Simulator",
        WatchOsSimulator = 9 => "watchOS Simulator",
        DriverKit = 10 => "DriverKit",
        VisionOs = 11 => "visionOS",
        VisionOsSimulator = 12 => "visionOS Simulator",
    }
}

impl Platform {
    pub fn lookup(raw: u32) -> Lookup<Self, u32> {
        Self::from_raw(raw).map_or(Lookup::Unknown(raw), Lookup::Known)
    }
}

/// Header flag bits and their names, in bit order.
pub const MH_FLAGS: &[(u32, &str)] = &[
    (0x0000_0001, "MH_NOUNDEFS"),
    (0x0000_0002, "MH_INCRLINK"),
    (0x0000_0004, "MH_DYLDLINK"),
    (0x0000_0008, "MH_BINDATLOAD"),
    (0x0000_0010, "MH_PREBOUND"),
    (0x0000_0020, "MH_SPLIT_SEGS"),
    (0x0000_0040, "MH_LAZY_INIT"),
    (0x0000_0080, "MH_TWOLEVEL"),
    (0x0000_0100, "MH_FORCE_FLAT"),
    (0x0000_0200, "MH_NOMULTIDEFS"),
    (0x0000_0400, "MH_NOFIXPREBINDING"),
    (0x0000_0800, "MH_PREBINDABLE"),
    (0x0000_1000, "MH_ALLMODSBOUND"),
    (0x0000_2000, "MH_SUBSECTIONS_VIA_SYMBOLS"),
    (0x0000_4000, "MH_CANONICAL"),
    (0x0000_8000, "MH_WEAK_DEFINES"),
    (0x0001_0000, "MH_BINDS_TO_WEAK"),
    (0x0002_0000, "MH_ALLOW_STACK_EXECUTION"),
    (0x0004_0000, "MH_ROOT_SAFE"),
    (0x0008_0000, "MH_SETUID_SAFE"),
    (0x0010_0000, "MH_NO_REEXPORTED_DYLIBS"),
    (0x0020_0000, "MH_PIE"),
    (0x0040_0000, "MH_DEAD_STRIPPABLE_DYLIB"),
    (0x0080_0000, "MH_HAS_TLV_DESCRIPTORS"),
    (0x0100_0000, "MH_NO_HEAP_EXECUTION"),
    (0x0200_0000, "MH_APP_EXTENSION_SAFE"),
    (0x0400_0000, "MH_NLIST_OUTOFSYNC_WITH_DYLDINFO"),
    (0x0800_0000, "MH_SIM_SUPPORT"),
    (0x8000_0000, "MH_DYLIB_IN_CACHE"),
];

pub fn flag_names(flags: u32) -> Vec<&'static str> {
    MH_FLAGS
        .iter()
        .filter(|(bit, _)| flags & bit != 0)
        .map(|&(_, name)| name)
        .collect()
}
