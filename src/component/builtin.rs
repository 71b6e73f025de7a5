// src/component/builtin.rs

//! The four upstream libraries that make up the wrapped Tor

use super::{
    ArchVariantRule, ComponentSpec, ConfigHeaderSpec, DryRunGrammar, ExclusionRule,
    NestedRetention, Placeholder, Preamble, RetentionRule, RevisionSelector, SourcePatch,
    ToolStep, VersionRule,
};
use crate::arch::{Arch, WordSize};

/// Extensions of files a pruned tree keeps
const SOURCE_EXTENSIONS: &[&str] = &["c", "h", "inc", "i"];

/// Per-platform header suffixes for autoconf-configured components
const PLATFORM_SUFFIXES: &[&str] = &["linux64", "linux32", "android64", "android32", "darwin64"];

/// Word-size header suffixes for OpenSSL
const WORD_SUFFIXES: &[&str] = &["x64", "x86"];

/// OpenSSL headers whose darwin64 form differs from the x64 one
const OPENSSL_PLATFORM_SUFFIXES: &[&str] = &["x64", "x86", "darwin64"];

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn retention(keep_dirs: &[&str], keep_root_sources: bool) -> RetentionRule {
    RetentionRule {
        keep_dirs: strings(keep_dirs),
        keep_root_sources,
        nested: Vec::new(),
        license_files: strings(&["LICENSE", "LICENSE.txt", "COPYING"]),
        source_extensions: strings(SOURCE_EXTENSIONS),
        strip_dirs: strings(&[".deps", ".libs"]),
    }
}

/// A dispatcher header plus one variant per suffix, all with the same placeholders
fn header_family(
    dir: &str,
    target_dir: &str,
    stem: &str,
    ext: &str,
    suffixes: &[&str],
    required: &[Placeholder],
) -> Vec<ConfigHeaderSpec> {
    let target_prefix = if target_dir.is_empty() {
        String::new()
    } else {
        format!("{}/", target_dir)
    };
    let mut headers = vec![ConfigHeaderSpec::new(
        &format!("{}/{}.{}", dir, stem, ext),
        &format!("{}{}.{}", target_prefix, stem, ext),
        &[],
    )];
    for suffix in suffixes {
        headers.push(ConfigHeaderSpec::new(
            &format!("{}/{}.{}.{}", dir, stem, suffix, ext),
            &format!("{}{}.{}.{}", target_prefix, stem, suffix, ext),
            required,
        ));
    }
    headers
}

/// zlib: no configure step, every root `.c` file is a unit
pub fn zlib() -> ComponentSpec {
    ComponentSpec {
        name: "zlib".to_string(),
        source_url: "https://github.com/madler/zlib".to_string(),
        revision: RevisionSelector::DefaultBranch,
        version_rule: VersionRule::Define {
            file: "zlib.h".to_string(),
            name: "ZLIB_VERSION".to_string(),
        },
        retention: retention(&[], true),
        configure: Vec::new(),
        dry_run: None,
        grammar: DryRunGrammar::SourceListing,
        exclusions: Vec::new(),
        arch_variants: Vec::new(),
        patches: Vec::new(),
        stub_template: "zlib/stub.c.in".to_string(),
        preamble_template: "preamble.in".to_string(),
        preamble: Preamble {
            include_dirs: strings(&["zlib"]),
            defines: vec![
                ("HAVE_UNISTD_H".to_string(), None),
                ("HAVE_STDARG_H".to_string(), None),
            ],
            link_libs: Vec::new(),
        },
        config_headers: Vec::new(),
    }
}

/// libevent: autotools, libtool objects announced by the dry-run
pub fn libevent() -> ComponentSpec {
    ComponentSpec {
        name: "libevent".to_string(),
        source_url: "https://github.com/libevent/libevent".to_string(),
        revision: RevisionSelector::DefaultBranch,
        version_rule: VersionRule::Autoconf {
            file: "configure.ac".to_string(),
            package: "libevent".to_string(),
        },
        retention: retention(&["include", "compat"], true),
        configure: vec![
            ToolStep::new("./autogen.sh", &[]),
            ToolStep::new("./configure", &["--disable-shared", "--enable-static"]),
        ],
        dry_run: Some(ToolStep::new("make", &["--dry-run", "libevent.la"])),
        grammar: DryRunGrammar::LibtoolObjects,
        exclusions: Vec::new(),
        arch_variants: Vec::new(),
        patches: Vec::new(),
        stub_template: "libevent/stub.c.in".to_string(),
        preamble_template: "preamble.in".to_string(),
        preamble: Preamble {
            include_dirs: strings(&[
                "libevent_config",
                "libevent",
                "libevent/compat",
                "libevent/include",
            ]),
            defines: Vec::new(),
            link_libs: Vec::new(),
        },
        config_headers: header_family(
            "libevent",
            "event2",
            "event-config",
            "h",
            PLATFORM_SUFFIXES,
            &[Placeholder::Version, Placeholder::NumericVersion],
        ),
    }
}

/// OpenSSL: bespoke `config` script, tracks the newest stable branch
pub fn openssl() -> ComponentSpec {
    let mut config_headers = vec![ConfigHeaderSpec::new(
        "openssl/dso_conf.h",
        "crypto/dso_conf.h",
        &[],
    )];
    config_headers.extend(header_family(
        "openssl", "crypto", "bn_conf", "h", WORD_SUFFIXES, &[],
    ));
    config_headers.extend(header_family(
        "openssl",
        "",
        "buildinf",
        "h",
        OPENSSL_PLATFORM_SUFFIXES,
        &[Placeholder::BuildDate],
    ));
    config_headers.extend(header_family(
        "openssl", "openssl", "opensslconf", "h", OPENSSL_PLATFORM_SUFFIXES, &[],
    ));

    ComponentSpec {
        name: "openssl".to_string(),
        source_url: "https://github.com/openssl/openssl".to_string(),
        revision: RevisionSelector::LatestStable {
            pattern: r"OpenSSL_([0-9]+_[0-9]+_[0-9]+)-stable".to_string(),
        },
        version_rule: VersionRule::BranchName {
            prefix: "OpenSSL_".to_string(),
        },
        retention: retention(&["crypto", "engines", "include", "ssl"], true),
        configure: vec![ToolStep::new(
            "./config",
            &["no-shared", "no-zlib", "no-asm", "no-async", "no-sctp"],
        )],
        dry_run: Some(ToolStep::new("make", &["--dry-run"])),
        grammar: DryRunGrammar::CompileLines,
        exclusions: vec![
            ExclusionRule::PathPrefix("apps/".to_string()),
            ExclusionRule::PathPrefix("fuzz/".to_string()),
            ExclusionRule::PathPrefix("test/".to_string()),
        ],
        arch_variants: Vec::new(),
        patches: Vec::new(),
        stub_template: "openssl/stub.c.in".to_string(),
        preamble_template: "preamble.in".to_string(),
        preamble: Preamble {
            include_dirs: strings(&[
                "openssl_config",
                "openssl",
                "openssl/include",
                "openssl/crypto/ec/curve448",
                "openssl/crypto/ec/curve448/arch_32",
                "openssl/crypto/modes",
            ]),
            defines: Vec::new(),
            link_libs: Vec::new(),
        },
        config_headers,
    }
}

/// Tor: autotools, compile lines, one word-size tuned unit
pub fn tor() -> ComponentSpec {
    let mut retention = retention(&["src"], false);
    retention.nested.push(NestedRetention {
        parent: "src".to_string(),
        keep: strings(&["app", "core", "ext", "feature", "lib", "trunnel", "win32"]),
    });

    let mut config_headers = header_family(
        "tor",
        "",
        "orconfig",
        "h",
        PLATFORM_SUFFIXES,
        &[Placeholder::Version],
    );
    config_headers.push(ConfigHeaderSpec::new(
        "tor/micro-revision.i",
        "micro-revision.i",
        &[],
    ));

    ComponentSpec {
        name: "tor".to_string(),
        source_url: "https://git.torproject.org/tor.git".to_string(),
        revision: RevisionSelector::Ref("release-0.3.5".to_string()),
        version_rule: VersionRule::Define {
            file: "src/win32/orconfig.h".to_string(),
            name: "VERSION".to_string(),
        },
        retention,
        configure: vec![
            ToolStep::new("./autogen.sh", &[]),
            ToolStep::new("./configure", &["--disable-asciidoc"]),
        ],
        dry_run: Some(ToolStep::new("make", &["--dry-run"])),
        grammar: DryRunGrammar::CompileLines,
        exclusions: vec![
            ExclusionRule::PathPrefix("src/ext/tinytest".to_string()),
            ExclusionRule::PathPrefix("src/test/".to_string()),
            ExclusionRule::PathPrefix("src/tools/".to_string()),
            ExclusionRule::StemSuffix("tor_main".to_string()),
        ],
        arch_variants: vec![ArchVariantRule {
            unit: "src/ext/curve25519_donna/curve25519-donna-c64.c".to_string(),
            tuned: "src/ext/curve25519_donna/curve25519-donna-c64.c".to_string(),
            fallback: "src/ext/curve25519_donna/curve25519-donna.c".to_string(),
            tuned_archs: Arch::ALL
                .into_iter()
                .filter(|a| a.word_size() == WordSize::Bits64)
                .collect(),
        }],
        patches: vec![SourcePatch {
            file: "src/lib/string/compat_string.c".to_string(),
            from: "strlcpy.c".to_string(),
            to: "ext/strlcpy.c".to_string(),
        }],
        stub_template: "tor/stub.c.in".to_string(),
        preamble_template: "preamble.in".to_string(),
        preamble: Preamble {
            include_dirs: strings(&[
                "tor_config",
                "tor",
                "tor/src",
                "tor/src/core/or",
                "tor/src/ext",
                "tor/src/ext/trunnel",
                "tor/src/feature/api",
            ]),
            defines: vec![
                ("ED25519_CUSTOMRANDOM".to_string(), None),
                ("ED25519_CUSTOMHASH".to_string(), None),
                ("ED25519_SUFFIX".to_string(), Some("_donna".to_string())),
            ],
            link_libs: strings(&["m"]),
        },
        config_headers,
    }
}

/// All components, in link-dependency order (dependencies first)
pub fn builtin_components() -> Vec<ComponentSpec> {
    vec![zlib(), libevent(), openssl(), tor()]
}

pub fn find_builtin(name: &str) -> Option<ComponentSpec> {
    builtin_components().into_iter().find(|c| c.name == name)
}
