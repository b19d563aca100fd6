fn main() {
    tpccbench::cmdline();
}
