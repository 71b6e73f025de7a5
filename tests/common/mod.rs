// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.
//!
//! [`FakeUpstream`] stands in for git, the upstream build systems and the
//! verification build. `git clone` materializes a small fixture tree for the
//! cloned component, and `make` replays a captured dry-run transcript from
//! `tests/fixtures/dry-run/`.

#![allow(dead_code)]

use libtor_gen::{CommandOutput, GeneratorConfig, ToolCommand, ToolRunner};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use walkdir::WalkDir;

pub const ZLIB_COMMIT: &str = "cacf7f1d4e3d44d871b605da3b647f07d718623f";
pub const LIBEVENT_COMMIT: &str = "4c908dde58ef780eeefcc9df4db3063ca62ea862";
pub const OPENSSL_COMMIT: &str = "b2758a2292aceda93e9f44c219b94fe21bb9a650";
pub const TOR_COMMIT: &str = "5b5e9ec1ab3e63b1ff4ec07c1e96bd9c4b1b3a02";

pub const COMMIT_DATE: &str = "Mon Feb 25 14:55:44 2019 +0100";

/// Remote branches the OpenSSL fixture repository advertises
const OPENSSL_BRANCHES: &str = "  origin/HEAD -> origin/master
  origin/OpenSSL_1_0_2-stable
  origin/OpenSSL_1_1_0-stable
  origin/OpenSSL_1_1_1-stable
  origin/master
";

const ZLIB_TREE: &[(&str, &str)] = &[
    ("adler32.c", "#include \"zutil.h\"\n"),
    ("inflate.c", "#include \"zutil.h\"\n"),
    ("zutil.h", "#include \"zlib.h\"\n"),
    ("zlib.h", "#define ZLIB_VERSION \"1.2.11\"\n#define ZLIB_VERNUM 0x12b0\n"),
    ("LICENSE", "zlib license\n"),
    ("Makefile.in", "all: libz.a\n"),
    ("configure", "#!/bin/sh\n"),
    ("test/example.c", "int main(void) { return 0; }\n"),
    ("contrib/minizip/zip.c", "\n"),
];

const LIBEVENT_TREE: &[(&str, &str)] = &[
    (
        "configure.ac",
        "AC_INIT(libevent,2.2.0-alpha-dev)\nAC_DEFINE(NUMERIC_VERSION, 0x02020000, [Numeric representation of the version])\n",
    ),
    ("autogen.sh", "#!/bin/sh\n"),
    ("buffer.c", "#include \"event2/buffer.h\"\n"),
    ("event.c", "#include \"event2/event.h\"\n"),
    ("evthread.c", "#include \"event2/thread.h\"\n"),
    ("include/event2/event.h", "\n"),
    ("include/event2/buffer.h", "\n"),
    ("include/event2/thread.h", "\n"),
    ("include/Makefile.am", "\n"),
    ("compat/sys/queue.h", "\n"),
    ("LICENSE", "3-clause BSD\n"),
    ("test/regress.c", "\n"),
    ("sample/hello-world.c", "\n"),
];

const OPENSSL_TREE: &[(&str, &str)] = &[
    ("config", "#!/bin/sh\n"),
    ("Configure", "#!/usr/bin/perl\n"),
    ("crypto/mem.c", "#include \"internal/cryptlib.h\"\n"),
    ("crypto/build.info", "LIBS=../libcrypto\n"),
    ("crypto/ec/curve448/curve448.c", "\n"),
    ("crypto/ec/curve448/arch_32/f_impl.h", "\n"),
    ("crypto/modes/modes_lcl.h", "\n"),
    ("ssl/ssl_lib.c", "#include \"ssl_locl.h\"\n"),
    ("ssl/ssl_locl.h", "\n"),
    ("include/openssl/ssl.h", "\n"),
    ("include/internal/cryptlib.h", "\n"),
    ("engines/e_capi.c", "\n"),
    ("apps/openssl.c", "int main(void) { return 0; }\n"),
    ("fuzz/asn1.c", "\n"),
    ("test/bntest.c", "\n"),
    ("doc/man3/SSL_new.pod", "\n"),
    ("LICENSE", "Apache License 2.0\n"),
];

const TOR_TREE: &[(&str, &str)] = &[
    ("autogen.sh", "#!/bin/sh\n"),
    ("configure.ac", "AC_INIT([tor],[0.3.5.8])\n"),
    ("Makefile.am", "\n"),
    ("LICENSE", "Tor license\n"),
    ("doc/tor.1.txt", "\n"),
    ("src/win32/orconfig.h", "#define VERSION \"0.3.5.8\"\n"),
    ("src/core/or/relay.c", "#include \"core/or/or.h\"\n"),
    ("src/core/or/or.h", "\n"),
    ("src/core/or/include.am", "\n"),
    (
        "src/lib/string/compat_string.c",
        "#ifndef HAVE_STRLCPY\n#include \"strlcpy.c\"\n#endif\n",
    ),
    ("src/ext/strlcpy.c", "\n"),
    ("src/ext/curve25519_donna/curve25519-donna-c64.c", "/* 64-bit */\n"),
    ("src/ext/curve25519_donna/curve25519-donna.c", "/* generic */\n"),
    ("src/ext/trunnel/trunnel.h", "\n"),
    ("src/feature/api/tor_api.h", "\n"),
    ("src/app/main/tor_main.c", "int main(int c, char **v) { return 0; }\n"),
    ("src/test/test.c", "\n"),
    ("src/tools/tor-resolve.c", "\n"),
    ("src/config/torrc.sample.in", "\n"),
];

/// Fixture for the component a repository URL belongs to
fn fixture_for(url: &str) -> Option<(&'static str, &'static [(&'static str, &'static str)])> {
    if url.contains("zlib") {
        Some(("zlib", ZLIB_TREE))
    } else if url.contains("libevent") {
        Some(("libevent", LIBEVENT_TREE))
    } else if url.contains("openssl") {
        Some(("openssl", OPENSSL_TREE))
    } else if url.contains("tor") {
        Some(("tor", TOR_TREE))
    } else {
        None
    }
}

fn commit_for(component: &str) -> &'static str {
    match component {
        "zlib" => ZLIB_COMMIT,
        "libevent" => LIBEVENT_COMMIT,
        "openssl" => OPENSSL_COMMIT,
        _ => TOR_COMMIT,
    }
}

pub fn write_tree(root: &Path, files: &[(&str, &str)]) {
    for (path, content) in files {
        let full = root.join(path);
        fs::create_dir_all(full.parent().unwrap()).unwrap();
        fs::write(full, content).unwrap();
    }
}

pub fn fixture_path(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

/// Scripted stand-in for every external tool the generator runs
pub struct FakeUpstream {
    /// Commands whose command line starts with one of these fail
    fail_on: Vec<String>,
    calls: Mutex<Vec<String>>,
}

impl FakeUpstream {
    pub fn new() -> Self {
        Self {
            fail_on: Vec::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_on(prefix: &str) -> Self {
        Self {
            fail_on: vec![prefix.to_string()],
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Every command line run so far
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn respond(&self, command: &ToolCommand) -> io::Result<(i32, String, String)> {
        // Every tool except the initial clone runs inside the component's tree
        let component = command
            .cwd
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let args: Vec<&str> = command.args.iter().map(String::as_str).collect();

        match (command.program.as_str(), args.as_slice()) {
            ("git", ["clone", .., url, dest]) => {
                let (_, files) = fixture_for(url).ok_or_else(|| {
                    io::Error::new(io::ErrorKind::NotFound, format!("no fixture for {}", url))
                })?;
                write_tree(Path::new(dest), files);
                Ok((0, String::new(), format!("Cloning into '{}'...\n", dest)))
            }
            ("git", ["branch", "-r"]) => Ok((0, OPENSSL_BRANCHES.to_string(), String::new())),
            ("git", ["checkout", ..]) => Ok((0, String::new(), String::new())),
            ("git", ["rev-parse", "HEAD"]) => {
                Ok((0, format!("{}\n", commit_for(&component)), String::new()))
            }
            ("git", ["show", ..]) => Ok((0, format!("{}\n", COMMIT_DATE), String::new())),
            ("make", _) => {
                let path = fixture_path(&format!("dry-run/{}.txt", component));
                Ok((0, fs::read_to_string(path)?, String::new()))
            }
            ("./autogen.sh" | "./configure" | "./config", _) => {
                Ok((0, format!("configured {}\n", component), String::new()))
            }
            ("cargo", _) => Ok((0, String::new(), "Finished dev profile\n".to_string())),
            (program, _) => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{}: command not found", program),
            )),
        }
    }
}

impl ToolRunner for FakeUpstream {
    fn run(&self, command: &ToolCommand) -> io::Result<CommandOutput> {
        let line = command.command_line();
        self.calls.lock().unwrap().push(line.clone());

        if self.fail_on.iter().any(|p| line.starts_with(p.as_str())) {
            return Ok(CommandOutput {
                command: line,
                status: Some(2),
                stdout: String::new(),
                stderr: "fixture failure: simulated upstream breakage".to_string(),
            });
        }

        let (status, stdout, stderr) = self.respond(command)?;
        Ok(CommandOutput {
            command: line,
            status: Some(status),
            stdout,
            stderr,
        })
    }
}

/// Config generating into `output` with the repository's own assets
pub fn test_config(output: &Path) -> GeneratorConfig {
    GeneratorConfig {
        output_dir: output.to_path_buf(),
        assets_dir: Path::new(env!("CARGO_MANIFEST_DIR")).join("assets"),
        ..Default::default()
    }
}

/// Relative path to contents for every file below `root`
pub fn snapshot(root: &Path) -> BTreeMap<String, Vec<u8>> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .map(|e| e.unwrap())
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            let rel = e.path().strip_prefix(root).unwrap().to_string_lossy().to_string();
            (rel, fs::read(e.path()).unwrap())
        })
        .collect()
}

pub fn read(root: &Path, path: &str) -> String {
    fs::read_to_string(root.join(path)).unwrap_or_else(|e| panic!("{}: {}", path, e))
}
