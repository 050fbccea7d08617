//! Build-system profiles.
//!
//! A profile supplies default commands for the phases a definition leaves
//! empty. Profiles are detected from the top-level file names of a checked
//! out source tree.

use std::path::Path;

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::definitions::BuildStep;

pub struct BuildSystem {
  pub name: &'static str,
  detect: fn(&[String]) -> bool,
  commands: &'static [(BuildStep, &'static [&'static str])],
}

impl BuildSystem {
  /// Default commands for a phase (empty when the profile has none).
  pub fn commands_for(&self, step: BuildStep) -> &'static [&'static str] {
    self
      .commands
      .iter()
      .find(|(s, _)| *s == step)
      .map(|(_, cmds)| *cmds)
      .unwrap_or(&[])
  }

  pub fn matches(&self, files: &[String]) -> bool {
    (self.detect)(files)
  }
}

impl std::fmt::Debug for BuildSystem {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("BuildSystem").field("name", &self.name).finish()
  }
}

const MAKE_INSTALL: &[&str] = &["make DESTDIR=\"$DESTDIR\" install"];

pub static AUTOTOOLS: BuildSystem = BuildSystem {
  name: "autotools",
  detect: is_autotools,
  commands: &[
    (
      BuildStep::Configure,
      &[
        "export NOCONFIGURE=1; \
         if [ -e autogen ]; then ./autogen; \
         elif [ -e autogen.sh ]; then ./autogen.sh; \
         elif [ ! -e ./configure ]; then autoreconf -ivf; fi",
        "./configure --prefix=\"$PREFIX\"",
      ],
    ),
    (BuildStep::Build, &["make"]),
    (BuildStep::Install, MAKE_INSTALL),
  ],
};

pub static PYTHON_DISTUTILS: BuildSystem = BuildSystem {
  name: "python-distutils",
  detect: is_python_distutils,
  commands: &[
    (BuildStep::Build, &["python setup.py build"]),
    (
      BuildStep::Install,
      &["python setup.py install --prefix \"$PREFIX\" --root \"$DESTDIR\""],
    ),
  ],
};

pub static CPAN: BuildSystem = BuildSystem {
  name: "cpan",
  detect: is_cpan,
  commands: &[
    (
      BuildStep::Configure,
      &["perl Makefile.PL INSTALLDIRS=perl \
         INSTALLARCHLIB=\"$PREFIX/lib/perl\" \
         INSTALLPRIVLIB=\"$PREFIX/lib/perl\" \
         INSTALLBIN=\"$PREFIX/bin\" \
         INSTALLSCRIPT=\"$PREFIX/bin\" \
         INSTALLMAN1DIR=\"$PREFIX/share/man/man1\" \
         INSTALLMAN3DIR=\"$PREFIX/share/man/man3\""],
    ),
    (BuildStep::Build, &["make"]),
    (BuildStep::Install, MAKE_INSTALL),
  ],
};

pub static CMAKE: BuildSystem = BuildSystem {
  name: "cmake",
  detect: is_cmake,
  commands: &[
    (BuildStep::Configure, &["cmake -DCMAKE_INSTALL_PREFIX=\"$PREFIX\""]),
    (BuildStep::Build, &["make"]),
    (BuildStep::Install, MAKE_INSTALL),
  ],
};

pub static QMAKE: BuildSystem = BuildSystem {
  name: "qmake",
  detect: is_qmake,
  commands: &[
    (BuildStep::Configure, &["qmake -makefile"]),
    (BuildStep::Build, &["make"]),
    (BuildStep::Install, &["make INSTALL_ROOT=\"$DESTDIR\" install"]),
  ],
};

pub static MANUAL: BuildSystem = BuildSystem {
  name: "manual",
  detect: never,
  commands: &[],
};

/// All profiles in detection order.
pub static BUILD_SYSTEMS: [&BuildSystem; 6] = [&AUTOTOOLS, &PYTHON_DISTUTILS, &CPAN, &CMAKE, &QMAKE, &MANUAL];

fn has_file(files: &[String], name: &str) -> bool {
  files.iter().any(|f| f == name)
}

fn is_autotools(files: &[String]) -> bool {
  ["configure", "configure.ac", "configure.in", "autogen.sh", "autogen"]
    .iter()
    .any(|f| has_file(files, f))
}

fn is_python_distutils(files: &[String]) -> bool {
  has_file(files, "setup.py")
}

fn is_cpan(files: &[String]) -> bool {
  has_file(files, "Makefile.PL")
}

fn is_cmake(files: &[String]) -> bool {
  has_file(files, "CMakeLists.txt")
}

fn is_qmake(files: &[String]) -> bool {
  files.iter().any(|f| f.ends_with(".pro"))
}

fn never(_: &[String]) -> bool {
  false
}

pub fn lookup(name: &str) -> Option<&'static BuildSystem> {
  BUILD_SYSTEMS.iter().copied().find(|bs| bs.name == name)
}

/// Pick a profile from a file listing, falling back to `manual`.
pub fn detect(files: &[String]) -> &'static BuildSystem {
  match BUILD_SYSTEMS.iter().copied().find(|bs| bs.matches(files)) {
    Some(bs) => {
      debug!(build_system = bs.name, "detected build system");
      bs
    }
    None => {
      warn!("no build system detected, falling back to manual");
      &MANUAL
    }
  }
}

/// Sorted names of the top-level entries of `dir`.
pub fn list_files(dir: &Path) -> std::io::Result<Vec<String>> {
  let mut files = Vec::new();
  for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
    let entry = entry.map_err(std::io::Error::other)?;
    files.push(entry.file_name().to_string_lossy().into_owned());
  }
  files.sort();
  Ok(files)
}
