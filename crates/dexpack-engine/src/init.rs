//! Project scaffolding for `dexpack init`.

use std::path::Path;

use dexpack_config::manifest::{Manifest, MANIFEST_FILE};
use dexpack_config::{BuildKind, ProjectDescriptor};

use crate::error::EngineError;

/// A package name derived from a project name: `com.example.<letters and digits>`.
fn default_package(name: &str) -> String {
    let mut segment: String = name
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect();
    if !segment.starts_with(|c: char| c.is_ascii_alphabetic()) {
        segment.insert_str(0, "app");
    }
    format!("com.example.{segment}")
}

fn write(path: &Path, content: &str) -> Result<(), EngineError> {
    if let Some(parent) = path.parent() {
        dexpack_util::fs::ensure_dir(parent)?;
    }
    std::fs::write(path, content).map_err(|source| EngineError::io(path, source))
}

fn java_source(package: &str, class: &str, kind: BuildKind, name: &str) -> String {
    match kind {
        BuildKind::Application => format!(
            "package {package};\n\n\
             import android.app.Activity;\n\
             import android.os.Bundle;\n\
             import android.widget.TextView;\n\n\
             public class {class} extends Activity {{\n\
             \x20   @Override\n\
             \x20   protected void onCreate(Bundle savedInstanceState) {{\n\
             \x20       super.onCreate(savedInstanceState);\n\
             \x20       TextView view = new TextView(this);\n\
             \x20       view.setText(R.string.app_name);\n\
             \x20       setContentView(view);\n\
             \x20   }}\n\
             }}\n"
        ),
        BuildKind::PlainArchive => format!(
            "package {package};\n\n\
             public class {class} {{\n\
             \x20   public static void main(String[] args) {{\n\
             \x20       System.out.println(\"Hello, {name}!\");\n\
             \x20   }}\n\
             }}\n"
        ),
        BuildKind::LibraryArchive => format!(
            "package {package};\n\n\
             public final class {class} {{\n\
             \x20   private {class}() {{}}\n\n\
             \x20   public static String greet(String who) {{\n\
             \x20       return \"Hello, \" + who + \"!\";\n\
             \x20   }}\n\
             }}\n"
        ),
    }
}

fn android_manifest(package: &str, main_class: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<manifest xmlns:android="http://schemas.android.com/apk/res/android"
    package="{package}">
    <application android:label="@string/app_name">
        <activity android:name="{main_class}" android:exported="true">
            <intent-filter>
                <action android:name="android.intent.action.MAIN" />
                <category android:name="android.intent.category.LAUNCHER" />
            </intent-filter>
        </activity>
    </application>
</manifest>
"#
    )
}

fn strings_xml(name: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n\
         <resources>\n\
         \x20   <string name=\"app_name\">{name}</string>\n\
         </resources>\n"
    )
}

/// Scaffold a new project of `kind` in `dir`.
///
/// Writes `dexpack.toml`, a starter source file, and `.gitignore`; applications
/// also get `AndroidManifest.xml` and a string resource. `package` defaults to
/// one derived from `name`.
///
/// # Errors
/// Returns an error if `dir` already holds a project, the name or package is
/// invalid, or a file cannot be written.
pub fn init_project(
    name: &str,
    dir: &Path,
    kind: BuildKind,
    package: Option<&str>,
) -> Result<ProjectDescriptor, EngineError> {
    let manifest_path = dir.join(MANIFEST_FILE);
    if manifest_path.exists() {
        return Err(EngineError::ProjectExists {
            path: manifest_path.display().to_string(),
        });
    }

    let package = package.map_or_else(|| default_package(name), str::to_owned);
    let class = match kind {
        BuildKind::Application => "MainActivity",
        BuildKind::PlainArchive => "Main",
        BuildKind::LibraryArchive => "Greeter",
    };
    let qualified = format!("{package}.{class}");

    let mut manifest = Manifest::new(name, kind);
    manifest.project.package = Some(package.clone());
    if kind.requires_main_class() {
        manifest.project.main_class = Some(qualified.clone());
    }
    manifest.validate()?;

    dexpack_util::fs::ensure_dir(dir)?;
    manifest.write_to(&manifest_path)?;
    let project = ProjectDescriptor::open(dir)?;

    let source_root = project
        .source_roots()
        .into_iter()
        .next()
        .unwrap_or_else(|| dir.join("src/main/java"));
    let source = source_root.join(format!("{}.java", qualified.replace('.', "/")));
    write(&source, &java_source(&package, class, kind, name))?;

    if kind == BuildKind::Application {
        write(&project.android_manifest(), &android_manifest(&package, &qualified))?;
        write(
            &project.res_dir().join("values").join("strings.xml"),
            &strings_xml(name),
        )?;
    }
    dexpack_util::fs::ensure_dir(&project.libs_dir())?;
    write(&dir.join(".gitignore"), "build/\n")?;

    tracing::info!(name, kind = kind.as_str(), package = %package, "project created");
    Ok(project)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn app_scaffold_has_manifest_and_resources() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("hello");

        let project = init_project("hello", &dir, BuildKind::Application, None).unwrap();

        assert_eq!(project.kind(), BuildKind::Application);
        assert_eq!(project.package(), Some("com.example.hello"));
        assert_eq!(project.main_class(), Some("com.example.hello.MainActivity"));
        assert!(project.main_class_source().is_some());
        assert!(project.res_dir().join("values/strings.xml").is_file());
        assert_eq!(
            project.resolve_package().unwrap().as_deref(),
            Some("com.example.hello")
        );
        let gitignore = fs::read_to_string(dir.join(".gitignore")).unwrap();
        assert_eq!(gitignore, "build/\n");
    }

    #[test]
    fn jar_scaffold_uses_given_package() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("tool");

        let project = init_project("tool", &dir, BuildKind::PlainArchive, Some("org.acme.cli")).unwrap();

        assert_eq!(project.main_class(), Some("org.acme.cli.Main"));
        let source = fs::read_to_string(project.main_class_source().unwrap()).unwrap();
        assert!(source.contains("package org.acme.cli;"));
        assert!(source.contains("Hello, tool!"));
        assert!(!project.android_manifest().exists());
    }

    #[test]
    fn library_scaffold_has_no_main_class() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("util-lib");

        let project = init_project("util-lib", &dir, BuildKind::LibraryArchive, None).unwrap();

        assert_eq!(project.main_class(), None);
        assert!(dir
            .join("src/main/java/com/example/utillib/Greeter.java")
            .is_file());
    }

    #[test]
    fn refuses_existing_project() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("existing");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(MANIFEST_FILE), "").unwrap();

        let err = init_project("existing", &dir, BuildKind::Application, None).unwrap_err();
        assert!(err.to_string().contains("already exists"), "{err}");
    }

    #[test]
    fn invalid_package_writes_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("bad");

        let result = init_project("bad", &dir, BuildKind::Application, Some("com.1bad"));
        assert!(result.is_err());
        assert!(!dir.join(MANIFEST_FILE).exists());
    }

    #[test]
    fn derived_package_starts_with_a_letter() {
        assert_eq!(default_package("My-App"), "com.example.myapp");
        assert_eq!(default_package("2048"), "com.example.app2048");
    }
}
