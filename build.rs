// Keeps the embedded UI and icon in the rebuild graph.

fn main() {
    println!("cargo:rerun-if-changed=ui/dist");
    println!("cargo:rerun-if-changed=packaging/icons/app.png");
}
