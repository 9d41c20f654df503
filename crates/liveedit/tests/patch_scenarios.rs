use std::fs;
use std::path::Path;
use std::thread;

use anyhow::Result;
use liveedit::domain::model::SkipReason;
use liveedit::infra::config::Config;
use liveedit::infra::workspace::ProjectRoot;
use liveedit::{PatchEngine, PatchError, StampOptions, StampOutcome, Stamper};
use tempfile::TempDir;

const GREETING: &str = "export function Greeting() {\n  return (\n    <p>Hello</p>\n  );\n}\n";

fn project(files: &[(&str, &str)]) -> Result<(TempDir, PatchEngine, Stamper)> {
    let temp = tempfile::tempdir()?;
    for (path, contents) in files {
        let full = temp.path().join(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(full, contents)?;
    }
    let config = Config::default();
    let engine = PatchEngine::from_config(temp.path(), &config)?;
    let root = ProjectRoot::new(temp.path(), &config.paths.excluded)?;
    let stamper = Stamper::new(root, StampOptions::from_config(&config));
    Ok((temp, engine, stamper))
}

fn read(root: &Path, path: &str) -> Result<String> {
    Ok(fs::read_to_string(root.join(path))?)
}

/// Identifiers injected by the stamping pass, in document order.
fn stamped_identifiers(code: &str) -> Vec<String> {
    code.split("data-edit-id=\"")
        .skip(1)
        .filter_map(|rest| rest.split('"').next())
        .map(str::to_owned)
        .collect()
}

#[test]
fn stamp_then_patch_round_trip() -> Result<()> {
    let (temp, engine, stamper) = project(&[("a.tsx", GREETING)])?;

    let stamped = match stamper.stamp(&temp.path().join("a.tsx"), GREETING) {
        StampOutcome::Transformed(stamped) => stamped,
        other => panic!("unexpected outcome {other:?}"),
    };
    assert!(stamped.code.contains("<p data-edit-id=\"a.tsx:3:5\">Hello</p>"));

    let outcome = engine.apply_patch("a.tsx:3:5", "Hi")?;
    assert_eq!(outcome.file_path, "a.tsx");
    assert_eq!(outcome.new_content, GREETING.replace("Hello", "Hi"));
    assert_eq!(read(temp.path(), "a.tsx")?, outcome.new_content);
    Ok(())
}

#[test]
fn every_stamped_identifier_addresses_its_element() -> Result<()> {
    let source = "export const List = () => (\n  <ul>\n    <li>first</li>\n    <li>zweite é</li>\n    <li>third 😀</li>\n  </ul>\n);\n";
    let (temp, engine, stamper) = project(&[("src/List.jsx", source)])?;

    let StampOutcome::Transformed(stamped) =
        stamper.stamp(&temp.path().join("src/List.jsx"), source)
    else {
        panic!("expected the file to be stamped");
    };
    let identifiers = stamped_identifiers(&stamped.code);
    assert_eq!(identifiers.len(), 4);

    // The `ul` wraps only elements; every `li` is patchable by its identifier.
    let err = engine.apply_patch(&identifiers[0], "x").unwrap_err();
    assert!(matches!(err, PatchError::NotMutable { .. }));
    assert_eq!(read(temp.path(), "src/List.jsx")?, source);
    for (index, identifier) in identifiers.iter().enumerate().skip(1) {
        engine.apply_patch(identifier, &format!("item {index}"))?;
    }

    let patched = read(temp.path(), "src/List.jsx")?;
    assert!(patched.contains("<li>item 1</li>"));
    assert!(patched.contains("<li>item 2</li>"));
    assert!(patched.contains("<li>item 3</li>"));
    Ok(())
}

#[test]
fn patch_changes_only_the_target_line() -> Result<()> {
    let source = "import { t } from './t';\n\nexport default function Page() {\n  return (\n    <main>\n      <h1 className=\"title\">Welcome</h1>\n      <p>Intro</p>\n      {/* comment */}\n    </main>\n  );\n}\n";
    let (temp, engine, _) = project(&[("Page.tsx", source)])?;

    engine.apply_patch("Page.tsx:6:7", "Hello there")?;

    let patched = read(temp.path(), "Page.tsx")?;
    let before: Vec<_> = source.lines().collect();
    let after: Vec<_> = patched.lines().collect();
    assert_eq!(before.len(), after.len());
    for (index, (old, new)) in before.iter().zip(&after).enumerate() {
        if index == 5 {
            assert_eq!(*new, "      <h1 className=\"title\">Hello there</h1>");
        } else {
            assert_eq!(old, new, "line {} changed", index + 1);
        }
    }
    Ok(())
}

#[test]
fn empty_value_leaves_an_empty_text_child() -> Result<()> {
    let (temp, engine, _) = project(&[("a.tsx", GREETING)])?;

    let outcome = engine.apply_patch("a.tsx:3:5", "")?;
    assert!(outcome.new_content.contains("<p></p>"));

    engine.apply_patch("a.tsx:3:5", "Again")?;
    assert_eq!(read(temp.path(), "a.tsx")?, GREETING.replace("Hello", "Again"));
    Ok(())
}

#[test]
fn elements_on_one_line_are_addressed_independently() -> Result<()> {
    let source = "const v = <div><b>one</b> <i>two</i></div>;\n";
    let (temp, engine, stamper) = project(&[("a.jsx", source)])?;

    let StampOutcome::Transformed(stamped) = stamper.stamp(&temp.path().join("a.jsx"), source)
    else {
        panic!("expected the file to be stamped");
    };
    let identifiers = stamped_identifiers(&stamped.code);
    assert_eq!(identifiers, ["a.jsx:1:11", "a.jsx:1:16", "a.jsx:1:27"]);

    engine.apply_patch("a.jsx:1:16", "ONE")?;
    let patched = read(temp.path(), "a.jsx")?;
    assert_eq!(patched, "const v = <div><b>ONE</b> <i>two</i></div>;\n");
    Ok(())
}

#[test]
fn stale_identifier_reports_target_not_found_and_keeps_file() -> Result<()> {
    let (temp, engine, _) = project(&[("a.tsx", GREETING)])?;

    let err = engine.apply_patch("a.tsx:4:5", "Hi").unwrap_err();
    assert!(matches!(err, PatchError::TargetNotFound { .. }));
    assert_eq!(err.kind(), "TargetNotFound");
    assert_eq!(read(temp.path(), "a.tsx")?, GREETING);
    Ok(())
}

#[test]
fn path_escapes_are_denied_before_reading() -> Result<()> {
    let temp = tempfile::tempdir()?;
    let root = temp.path().join("app");
    fs::create_dir_all(root.join("node_modules/lib"))?;
    fs::write(temp.path().join("secret.tsx"), "const s = <p>secret</p>;\n")?;
    fs::write(temp.path().join("secret.txt"), "secret")?;
    fs::write(root.join("node_modules/lib/x.jsx"), "const v = <p>dep</p>;\n")?;
    let engine = PatchEngine::from_config(&root, &Config::default())?;

    let outside = temp.path().join("secret.tsx");
    let absolute = format!("{}:1:11", outside.display());
    for identifier in [
        "../secret.txt:1:1",
        "../secret.tsx:1:11",
        "src/../../secret.tsx:1:11",
        absolute.as_str(),
        "node_modules/lib/x.jsx:1:11",
    ] {
        let err = engine.apply_patch(identifier, "pwned").unwrap_err();
        assert!(
            matches!(err, PatchError::AccessDenied { .. }),
            "{identifier}: {err}"
        );
    }

    assert_eq!(
        fs::read_to_string(&outside)?,
        "const s = <p>secret</p>;\n"
    );
    Ok(())
}

#[test]
fn malformed_identifiers_are_rejected() -> Result<()> {
    let (_temp, engine, _) = project(&[("a.tsx", GREETING)])?;
    for identifier in ["", "a.tsx", "a.tsx:3", "a.tsx:x:5", ":3:5"] {
        let err = engine.apply_patch(identifier, "Hi").unwrap_err();
        assert!(
            matches!(err, PatchError::InvalidIdentifier(_)),
            "{identifier}: {err}"
        );
    }
    Ok(())
}

#[test]
fn concurrent_patches_to_one_file_are_all_kept() -> Result<()> {
    let items: String = (0..8).map(|i| format!("    <li>item {i}</li>\n")).collect();
    let source = format!("const v = (\n  <ul>\n{items}  </ul>\n);\n");
    let (temp, engine, _) = project(&[("list.tsx", source.as_str())])?;

    thread::scope(|scope| {
        for i in 0..8u32 {
            let engine = &engine;
            scope.spawn(move || {
                let identifier = format!("list.tsx:{}:5", i + 3);
                engine
                    .apply_patch(&identifier, &format!("patched number {i}"))
                    .expect("patch applies");
            });
        }
    });

    let patched = read(temp.path(), "list.tsx")?;
    for i in 0..8 {
        assert!(
            patched.contains(&format!("<li>patched number {i}</li>")),
            "lost update for item {i}:\n{patched}"
        );
    }
    Ok(())
}

#[test]
fn stamping_skips_are_never_errors() -> Result<()> {
    let (temp, _, stamper) = project(&[])?;
    let outcome = stamper.stamp(&temp.path().join("styles.css"), "p { color: red }");
    let StampOutcome::Skipped(reason) = outcome else {
        panic!("css must not be stamped");
    };
    assert_eq!(reason, SkipReason::UnsupportedExtension);
    assert!(reason.is_not_applicable());
    Ok(())
}
