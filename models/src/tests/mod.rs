mod helper_descriptor;
